use std::collections::HashMap;

use anyhow::Context as _;
use serde_json::Value;
use tera::Tera;
use tracing::{debug, info};

use crate::{registry, site::Context, store, store::Store};

/// Re-render every registered page against the current on-disk documents.
///
/// Profile, navigation, and each bound collection are loaded once per pass,
/// so every page in the pass sees the same snapshot. The first render or
/// write failure aborts the pass and leaves the remaining pages untouched.
pub fn regenerate(context: &Context, tera: &Tera, store: &Store) -> anyhow::Result<()> {
    let profile = store.load(store::PROFILE)?;
    let navigation = store.load(store::NAVIGATION)?;

    let mut collections: HashMap<&str, Value> = HashMap::new();
    for page in registry::PAGES {
        for (_, document) in page.bindings {
            if !collections.contains_key(document) {
                collections.insert(*document, store.load(document)?);
            }
        }
    }

    let output_dir = context.output_dir();

    for page in registry::PAGES {
        let mut ctx = tera::Context::new();
        ctx.insert("profile", &profile);
        ctx.insert("navigation", &navigation);
        ctx.insert("active_page", page.active_page);
        ctx.insert("base_url", &context.config.base_url);
        ctx.insert("permalink", &context.config.page_url(page.output)?);
        for (key, document) in page.bindings {
            ctx.insert(*key, &collections[document]);
        }

        let html = tera
            .render(page.template, &ctx)
            .with_context(|| format!("rendering {}", page.template))?;

        store::write_atomic(&output_dir.join(page.output), html.as_bytes())
            .with_context(|| format!("writing {}", page.output))?;

        debug!(page = page.output, "generated page");
    }

    info!(pages = registry::PAGES.len(), "site regenerated");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    /// A site root with one template per registered page, each echoing
    /// exactly the bindings the page declares.
    fn scaffold() -> (tempfile::TempDir, Context, Tera, Store) {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).unwrap();

        fs::write(
            templates.join("home.html"),
            "{% if profile %}{{ profile.name }}{% endif %}\
             {% for item in navigation %}[{{ item.label }}]{% endfor %}",
        )
        .unwrap();
        fs::write(
            templates.join("work.html"),
            "{% for project in projects %}<li>{{ project.title }}</li>{% endfor %}",
        )
        .unwrap();
        fs::write(
            templates.join("blogs.html"),
            "{% for blog in blogs %}<p>{{ blog.title }}</p>{% endfor %}",
        )
        .unwrap();
        fs::write(
            templates.join("tweets.html"),
            "{% for tweet in tweets %}<q>{{ tweet.text }}</q>{% endfor %}",
        )
        .unwrap();

        let context = Context::new(dir.path().to_path_buf()).unwrap();
        let tera =
            Tera::new(&templates.join("**").join("*").to_string_lossy()).unwrap();
        let store = Store::new(context.data_dir());

        (dir, context, tera, store)
    }

    #[test]
    fn renders_every_registered_page() {
        let (dir, context, tera, store) = scaffold();

        regenerate(&context, &tera, &store).unwrap();

        for page in registry::PAGES {
            assert!(dir.path().join(page.output).exists(), "{} missing", page.output);
        }
    }

    #[test]
    fn work_page_renders_projects_in_saved_order() {
        let (dir, context, tera, store) = scaffold();
        store
            .save(
                store::PROJECTS,
                &json!([{"title": "zeta"}, {"title": "alpha"}, {"title": "mid"}]),
            )
            .unwrap();

        regenerate(&context, &tera, &store).unwrap();

        let html = fs::read_to_string(dir.path().join("work.html")).unwrap();
        assert_eq!(html, "<li>zeta</li><li>alpha</li><li>mid</li>");
    }

    #[test]
    fn empty_collection_renders_zero_entries() {
        let (dir, context, tera, store) = scaffold();
        store.save(store::PROJECTS, &json!([])).unwrap();

        regenerate(&context, &tera, &store).unwrap();

        let html = fs::read_to_string(dir.path().join("work.html")).unwrap();
        assert_eq!(html, "");
    }

    #[test]
    fn absent_navigation_still_renders_all_pages() {
        let (dir, context, tera, store) = scaffold();
        store.save(store::PROFILE, &json!({"name": "Sean"})).unwrap();

        regenerate(&context, &tera, &store).unwrap();

        let html = fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(html, "Sean");
    }

    #[test]
    fn two_passes_are_byte_identical() {
        let (dir, context, tera, store) = scaffold();
        store.save(store::PROFILE, &json!({"name": "Sean"})).unwrap();
        store
            .save(store::NAVIGATION, &json!([{"label": "Home"}, {"label": "Work"}]))
            .unwrap();
        store.save(store::TWEETS, &json!([{"text": "hi"}])).unwrap();

        regenerate(&context, &tera, &store).unwrap();
        let first: Vec<Vec<u8>> = registry::PAGES
            .iter()
            .map(|p| fs::read(dir.path().join(p.output)).unwrap())
            .collect();

        regenerate(&context, &tera, &store).unwrap();
        let second: Vec<Vec<u8>> = registry::PAGES
            .iter()
            .map(|p| fs::read(dir.path().join(p.output)).unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn pages_carry_base_url_and_permalink_bindings() {
        let (dir, context, _tera, store) = scaffold();
        fs::write(
            dir.path().join("templates").join("home.html"),
            "{{ base_url }}|{{ permalink }}",
        )
        .unwrap();
        let tera = Tera::new(
            &dir.path().join("templates").join("**").join("*").to_string_lossy(),
        )
        .unwrap();

        regenerate(&context, &tera, &store).unwrap();

        let html = fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(html, "http://localhost:8000/|http://localhost:8000/");
    }

    #[test]
    fn render_failure_aborts_before_later_pages() {
        let (dir, context, _tera, store) = scaffold();
        // blogs.html is third in registry order; poison it with an
        // undefined variable so its render errors.
        fs::write(
            dir.path().join("templates").join("blogs.html"),
            "{{ no_such_binding }}",
        )
        .unwrap();
        let tera = Tera::new(
            &dir.path().join("templates").join("**").join("*").to_string_lossy(),
        )
        .unwrap();

        let result = regenerate(&context, &tera, &store);

        assert!(result.is_err());
        assert!(dir.path().join("index.html").exists());
        assert!(dir.path().join("work.html").exists());
        assert!(!dir.path().join("blogs.html").exists());
        assert!(!dir.path().join("tweets.html").exists());
    }
}
