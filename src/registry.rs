use crate::store;

/// One registered page: where it lands, what renders it, and which named
/// collections get bound into its context.
pub struct PageSpec {
    pub output: &'static str,
    pub template: &'static str,
    pub active_page: &'static str,
    pub bindings: &'static [(&'static str, &'static str)],
}

/// The full site, in render order. Adding a page means adding an entry here,
/// not touching the pipeline.
pub const PAGES: &[PageSpec] = &[
    PageSpec {
        output: "index.html",
        template: "home.html",
        active_page: "index",
        bindings: &[],
    },
    PageSpec {
        output: "work.html",
        template: "work.html",
        active_page: "work",
        bindings: &[("projects", store::PROJECTS)],
    },
    PageSpec {
        output: "blogs.html",
        template: "blogs.html",
        active_page: "blogs",
        bindings: &[("blogs", store::BLOGS)],
    },
    PageSpec {
        output: "tweets.html",
        template: "tweets.html",
        active_page: "tweets",
        bindings: &[("tweets", store::TWEETS)],
    },
];

pub fn find(active_page: &str) -> Option<&'static PageSpec> {
    PAGES.iter().find(|p| p.active_page == active_page)
}
