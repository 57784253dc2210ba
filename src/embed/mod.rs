//! Embedded static resources.
//!
//! - `serve` - live reload client script injected into served HTML
//! - `site` - minijinja templates of the HTML preview site
//!
//! ```ignore
//! use embed::serve::{HOTRELOAD_JS, HotreloadVars};
//!
//! let tag = HOTRELOAD_JS.script_tag(&HotreloadVars { ws_port: 35729 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for hotreload.js.
    pub struct HotreloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for HotreloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Live reload client with WebSocket port injection.
    pub const HOTRELOAD_JS: Template<HotreloadVars> = Template::new(include_str!("serve/hotreload.js"));
}

pub mod site {
    /// Index listing policies and narratives. The `.html` name turns on
    /// minijinja's HTML auto-escaping.
    pub const INDEX_HTML: (&str, &str) = ("index.html", include_str!("site/index.html"));

    /// One page per document.
    pub const PAGE_HTML: (&str, &str) = ("page.html", include_str!("site/page.html"));
}
