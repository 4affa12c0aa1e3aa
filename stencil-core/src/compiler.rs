use handlebars::{
    Context, Handlebars, RenderContext, RenderError, RenderErrorReason, Renderable, StringOutput,
    Template,
};
use serde::Serialize;
use serde_json::json;

use crate::document::TemplateDocument;
use crate::error::{BuildError, Result};
use crate::fragments::FragmentRegistry;
use crate::helpers::{register_helpers, usage_example};

/// Key the layout reads the rendered page from: `{{{yield}}}`.
pub const YIELD_KEY: &str = "yield";

/// Owns the Handlebars registry: helpers plus the current set of fragments
/// registered as partials.
pub struct Compiler {
    handlebars: Handlebars<'static>,
    fragments: Vec<String>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_helpers(None)
    }

    /// Same as [`Compiler::new`] but the `text` helper draws from a seeded
    /// generator, so output is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_helpers(Some(seed))
    }

    fn with_helpers(seed: Option<u64>) -> Self {
        let mut handlebars = Handlebars::new();
        register_helpers(&mut handlebars, seed);

        Self {
            handlebars,
            fragments: Vec::new(),
        }
    }

    /// Make exactly the fragments in `registry` resolvable as partials.
    ///
    /// Every previously loaded fragment is unregistered first. A fragment that
    /// fails to compile is left out and reported; pages that reference it
    /// fail on their own when rendered.
    pub fn load_fragments(&mut self, registry: &FragmentRegistry) -> Vec<BuildError> {
        for name in self.fragments.drain(..) {
            self.handlebars.unregister_template(&name);
        }

        let mut failures = Vec::new();
        for (name, raw) in registry.iter() {
            match self.handlebars.register_partial(name, raw) {
                Ok(()) => self.fragments.push(name.to_string()),
                Err(e) => failures.push(BuildError::Compile {
                    name: name.to_string(),
                    source: Box::new(e),
                }),
            }
        }

        failures
    }

    pub fn has_fragment(&self, name: &str) -> bool {
        self.fragments.iter().any(|f| f == name) && self.handlebars.has_template(name)
    }

    /// Parse `raw` once. The result can be rendered any number of times.
    pub fn compile(&self, name: &str, raw: &str) -> Result<CompiledTemplate> {
        let template =
            Template::compile_with_name(raw, name.to_string()).map_err(|e| BuildError::Compile {
                name: name.to_string(),
                source: Box::new(e),
            })?;

        Ok(CompiledTemplate {
            name: name.to_string(),
            template,
        })
    }

    pub fn compile_layout(&self, name: &str, raw: &str) -> Result<Layout> {
        Ok(Layout {
            template: self.compile(name, raw)?,
        })
    }

    /// Compile the document body and render it with its own metadata.
    pub fn render_document(&self, name: &str, doc: &TemplateDocument) -> Result<String> {
        self.compile(name, &doc.body)?.render(self, &doc.metadata)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    template: Template,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render against `data`. Fragments resolve against whatever the
    /// compiler has loaded at the time of this call.
    pub fn render<T: Serialize>(&self, compiler: &Compiler, data: &T) -> Result<String> {
        let ctx = Context::wraps(data).map_err(|e| render_error(&self.name, e))?;
        let mut rc = RenderContext::new(self.template.name.as_ref());
        let mut out = StringOutput::new();

        self.template
            .render(&compiler.handlebars, &ctx, &mut rc, &mut out)
            .map_err(|e| render_error(&self.name, e))?;

        out.into_string()
            .map_err(|e| render_error(&self.name, RenderError::from(e)))
    }
}

/// The outer page wrapper. Rendered content is handed to it as `yield`.
#[derive(Debug, Clone)]
pub struct Layout {
    template: CompiledTemplate,
}

impl Layout {
    pub fn wrap(&self, compiler: &Compiler, content: &str) -> Result<String> {
        self.template.render(compiler, &json!({ YIELD_KEY: content }))
    }
}

fn render_error(name: &str, err: RenderError) -> BuildError {
    let missing = match err.reason() {
        RenderErrorReason::ParamNotFoundForName(helper, param) => Some((*helper, param.clone())),
        RenderErrorReason::ParamNotFoundForIndex(helper, index) => {
            Some((*helper, format!("argument {index}")))
        }
        _ => None,
    };

    match missing {
        Some((helper, param)) => {
            let mut message = format!("{name}: helper `{helper}` requires `{param}`");
            if let Some(example) = usage_example(helper) {
                message.push_str(&format!(", e.g. {{{{{helper} {example}}}}}"));
            }
            BuildError::Config(message)
        }
        None => BuildError::Render {
            name: name.to_string(),
            source: Box::new(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(metadata: serde_json::Value, body: &str) -> TemplateDocument {
        TemplateDocument {
            metadata: metadata.as_object().cloned().unwrap_or_else(Map::new),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_document_uses_metadata() {
        let compiler = Compiler::new();
        let out = compiler
            .render_document("index.hbs", &doc(json!({"name": "World"}), "Hello {{name}}"))
            .unwrap();
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn test_layout_wraps_content() {
        let compiler = Compiler::new();
        let layout = compiler.compile_layout("main.hbs", "<body>{{{yield}}}</body>").unwrap();
        assert_eq!(layout.wrap(&compiler, "<p>hi</p>").unwrap(), "<body><p>hi</p></body>");
    }

    #[test]
    fn test_escaped_yield() {
        let compiler = Compiler::new();
        let layout = compiler.compile_layout("main.hbs", "<body>{{yield}}</body>").unwrap();
        assert_eq!(layout.wrap(&compiler, "Hello World").unwrap(), "<body>Hello World</body>");
        assert_eq!(layout.wrap(&compiler, "").unwrap(), "<body></body>");
    }

    #[test]
    fn test_compiled_layout_is_reused_across_pages() {
        let mut compiler = Compiler::new();
        let layout = compiler
            .compile_layout("main.hbs", "<main>{{> nav}}{{{yield}}}</main>")
            .unwrap();

        let mut registry = FragmentRegistry::new();
        registry.insert("nav", "<nav/>");
        compiler.load_fragments(&registry);

        assert_eq!(layout.wrap(&compiler, "one").unwrap(), "<main><nav/>one</main>");
        assert_eq!(layout.wrap(&compiler, "two").unwrap(), "<main><nav/>two</main>");
        assert_eq!(layout.template.template.name.as_deref(), Some("main.hbs"));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let compiler = Compiler::new();
        let err = compiler.compile("broken.hbs", "{{#if}}never closed").unwrap_err();
        match err {
            BuildError::Compile { name, .. } => assert_eq!(name, "broken.hbs"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_image_size_is_config_error() {
        let compiler = Compiler::new();
        let err = compiler
            .render_document("gallery.hbs", &doc(json!({}), "{{image}}"))
            .unwrap_err();
        match err {
            BuildError::Config(message) => {
                assert!(message.contains("gallery.hbs"));
                assert!(message.contains("250x300"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fragments_resolve_by_name() {
        let mut compiler = Compiler::new();
        let mut registry = FragmentRegistry::new();
        registry.insert("card", "<div>{{title}}</div>");

        assert!(compiler.load_fragments(&registry).is_empty());
        assert!(compiler.has_fragment("card"));

        let out = compiler
            .render_document("index.hbs", &doc(json!({"title": "T"}), "{{> card}}"))
            .unwrap();
        assert_eq!(out, "<div>T</div>");
    }

    #[test]
    fn test_reloading_fragments_forgets_old_names() {
        let mut compiler = Compiler::new();
        let mut registry = FragmentRegistry::new();
        registry.insert("card", "old");
        compiler.load_fragments(&registry);

        let mut renamed = FragmentRegistry::new();
        renamed.insert("tile", "new");
        compiler.load_fragments(&renamed);

        assert!(!compiler.has_fragment("card"));
        assert!(compiler.render_document("index.hbs", &doc(json!({}), "{{> card}}")).is_err());
        assert_eq!(
            compiler.render_document("index.hbs", &doc(json!({}), "{{> tile}}")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_broken_fragment_is_reported_not_loaded() {
        let mut compiler = Compiler::new();
        let mut registry = FragmentRegistry::new();
        registry.insert("broken", "{{#each}}");
        registry.insert("fine", "ok");

        let failures = compiler.load_fragments(&registry);
        assert_eq!(failures.len(), 1);
        assert!(!compiler.has_fragment("broken"));
        assert!(compiler.has_fragment("fine"));
    }

    #[test]
    fn test_fragment_keeps_front_matter_text() {
        let mut compiler = Compiler::new();
        let mut registry = FragmentRegistry::new();
        registry.insert("note", "---\nx: 1\n---\nbody");
        compiler.load_fragments(&registry);

        let out = compiler.render_document("index.hbs", &doc(json!({}), "{{> note}}")).unwrap();
        assert_eq!(out, "---\nx: 1\n---\nbody");
    }
}
