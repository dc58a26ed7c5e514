//! Static table of menu actions
//!
//! Each descriptor binds a button label to the collaborator its handler
//! calls. The table is fixed at compile time.

use serde::{Deserialize, Serialize};

/// Identifier of a menu action, as sent by front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionId {
    SearchWikipedia,
    OpenYoutube,
    OpenGoogle,
    FetchNews,
    OpenFile,
    Exit,
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionId::SearchWikipedia => "search_wikipedia",
            ActionId::OpenYoutube => "open_youtube",
            ActionId::OpenGoogle => "open_google",
            ActionId::FetchNews => "fetch_news",
            ActionId::OpenFile => "open_file",
            ActionId::Exit => "exit",
        };
        write!(f, "{}", name)
    }
}

/// Collaborator binding of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Page-summary provider, command is the search query
    Summarize,
    /// OS URL opener with a constant URL
    OpenUrl(&'static str),
    /// News provider with the configured key and country
    Headlines,
    /// OS file launcher, command is the path
    OpenFile,
    /// Process termination
    Terminate,
}

/// One menu button
#[derive(Debug, Clone, Copy)]
pub struct ActionDescriptor {
    pub id: ActionId,
    /// Button label
    pub label: &'static str,
    /// Spoken before speech capture; `None` when no query is needed
    pub prompt: Option<&'static str>,
    pub handler: Handler,
    /// Popup title for successful text results; `None` for handlers
    /// that never produce one
    pub result_title: Option<&'static str>,
    /// Popup title for errors
    pub error_title: &'static str,
    /// Whether a text result is also read aloud
    pub speak_result: bool,
    /// Spoken before a text result is read aloud
    pub intro: Option<&'static str>,
}

impl ActionDescriptor {
    /// Whether the handler needs a captured command
    pub fn requires_query(&self) -> bool {
        self.prompt.is_some()
    }
}

pub const YOUTUBE_URL: &str = "https://www.youtube.com";
pub const GOOGLE_URL: &str = "https://www.google.com";

static REGISTRY: [ActionDescriptor; 6] = [
    ActionDescriptor {
        id: ActionId::SearchWikipedia,
        label: "Search Wikipedia",
        prompt: Some("What do you want to search?"),
        handler: Handler::Summarize,
        result_title: Some("Wikipedia Results"),
        error_title: "Wikipedia Error",
        speak_result: true,
        intro: Some("According to Wikipedia"),
    },
    ActionDescriptor {
        id: ActionId::OpenYoutube,
        label: "Open YouTube",
        prompt: None,
        handler: Handler::OpenUrl(YOUTUBE_URL),
        result_title: None,
        error_title: "Error",
        speak_result: false,
        intro: None,
    },
    ActionDescriptor {
        id: ActionId::OpenGoogle,
        label: "Open Google",
        prompt: None,
        handler: Handler::OpenUrl(GOOGLE_URL),
        result_title: None,
        error_title: "Error",
        speak_result: false,
        intro: None,
    },
    ActionDescriptor {
        id: ActionId::FetchNews,
        label: "Fetch News",
        prompt: None,
        handler: Handler::Headlines,
        result_title: Some("Latest News"),
        error_title: "Latest News",
        speak_result: false,
        intro: None,
    },
    ActionDescriptor {
        id: ActionId::OpenFile,
        label: "Open File",
        prompt: Some("Please provide the file path."),
        handler: Handler::OpenFile,
        result_title: None,
        error_title: "Error",
        speak_result: false,
        intro: None,
    },
    ActionDescriptor {
        id: ActionId::Exit,
        label: "Exit",
        prompt: None,
        handler: Handler::Terminate,
        result_title: None,
        error_title: "Error",
        speak_result: false,
        intro: None,
    },
];

/// All menu actions in display order
pub fn registry() -> &'static [ActionDescriptor] {
    &REGISTRY
}

/// Find the descriptor for an action
pub fn lookup(id: ActionId) -> &'static ActionDescriptor {
    // Every ActionId has exactly one entry
    match REGISTRY.iter().find(|descriptor| descriptor.id == id) {
        Some(descriptor) => descriptor,
        None => unreachable!("action {} missing from registry", id),
    }
}
