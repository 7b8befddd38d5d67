// Tab navigation between the dashboard's three views
use super::error::InvalidSelection;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Analysis,
    Backend,
    Upload,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Analysis, Tab::Backend, Tab::Upload];

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Analysis => "analysis",
            Tab::Backend => "backend",
            Tab::Upload => "upload",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Analysis => "Analysis",
            Tab::Backend => "Backend Processes",
            Tab::Upload => "Upload & Process",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tab {
    type Err = InvalidSelection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.id() == s)
            .ok_or_else(|| InvalidSelection(s.to_string()))
    }
}

/// Exactly one active tab at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabSelection {
    active: Tab,
}

impl TabSelection {
    pub fn active(&self) -> Tab {
        self.active
    }

    /// Returns the tab that was active before.
    pub fn select(&mut self, tab: Tab) -> Tab {
        std::mem::replace(&mut self.active, tab)
    }
}
