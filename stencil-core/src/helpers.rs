//! Helpers available to every template and fragment.
//!
//! | helper     | usage                                         |
//! |------------|-----------------------------------------------|
//! | `image`    | `{{image size="250x300"}}`                    |
//! | `equals`   | `{{#equals a b}}...{{else}}...{{/equals}}`     |
//! | `contains` | `{{#contains "cat" title}}...{{/contains}}`    |
//! | `raw`      | `{{{{raw}}}}{{not rendered}}{{{{/raw}}}}`      |
//! | `text`     | `{{text 3}}`                                  |
//! | `repeat`   | `{{#repeat 3}}{{@index}}{{/repeat}}`           |

use std::sync::{Mutex, PoisonError};

use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output,
    RenderContext, RenderErrorReason, Renderable, html_escape, to_json,
};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde_json::Value as Json;

pub const PLACEHOLDER_URL: &str = "https://via.placeholder.com";

const LOREM: &str = "Fusce eget auctor elit, nec auctor nibh. Vestibulum ante ipsum primis in faucibus orci luctus et ultrices posuere cubilia curae. Cras auctor varius volutpat. Phasellus tempor felis ligula, ut euismod metus varius non. Suspendisse neque massa, porttitor non condimentum eget, pulvinar ac libero. Vivamus in congue mauris. Proin eget sapien id ipsum dictum rhoncus ut consequat libero. Aliquam lacus velit, viverra in ultrices vitae, euismod eget sem. Curabitur quis ultrices risus, sit amet interdum nulla. Vestibulum tincidunt mi nunc, aliquam tempus tortor convallis ac. Orci varius natoque penatibus et magnis dis parturient montes, nascetur ridiculus mus. Phasellus suscipit tempor ligula, nec scelerisque lacus finibus ai. Duis a porta massa, vel semper mi. Aenean in pharetra turpis. Fusce id malesuada libero. Integer cursus arcu vel odio efficitur sagittis.";

const SENTENCE_SEPARATOR: &str = ". ";

/// Upper bound on `{{#repeat}}` iterations.
pub const MAX_REPEAT: usize = 10_000;

/// Register all helpers. `seed` makes the `text` helper deterministic.
pub fn register_helpers(handlebars: &mut Handlebars<'static>, seed: Option<u64>) {
    handlebars.register_helper("image", Box::new(ImageHelper));
    handlebars.register_helper("equals", Box::new(EqualsHelper));
    handlebars.register_helper("contains", Box::new(ContainsHelper));
    handlebars.register_helper("raw", Box::new(RawHelper));
    handlebars.register_helper("repeat", Box::new(RepeatHelper));
    handlebars.register_helper("text", Box::new(LoremHelper::new(seed)));
}

/// Example arguments shown when a helper is called without a required one.
pub(crate) fn usage_example(helper: &str) -> Option<&'static str> {
    match helper {
        "image" => Some(r#"size="250x300""#),
        "repeat" => Some("count=3"),
        _ => None,
    }
}

pub struct ImageHelper;

impl HelperDef for ImageHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let size = h
            .hash_get("size")
            .map(|v| v.value().render())
            .filter(|s| !s.is_empty());

        let Some(size) = size else {
            return Err(RenderErrorReason::ParamNotFoundForName("image", "size".to_string()).into());
        };

        out.write(&format!("{PLACEHOLDER_URL}/{size}"))?;
        Ok(())
    }
}

pub struct EqualsHelper;

impl HelperDef for EqualsHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let matched = loose_eq(&param(h, 0), &param(h, 1));
        render_branch(matched, h, r, ctx, rc, out)
    }
}

pub struct ContainsHelper;

impl HelperDef for ContainsHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let needle = html_escape(&stringify(&param(h, 0)));
        let haystack = html_escape(&stringify(&param(h, 1)));
        render_branch(haystack.contains(&needle), h, r, ctx, rc, out)
    }
}

pub struct RawHelper;

impl HelperDef for RawHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        match h.template() {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

pub struct RepeatHelper;

impl HelperDef for RepeatHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let Some(count) = h.param(0).or_else(|| h.hash_get("count")) else {
            return Err(RenderErrorReason::ParamNotFoundForName("repeat", "count".to_string()).into());
        };
        let count = as_count(count.value()).ok_or(RenderErrorReason::InvalidParamType("number"))?;
        if count > MAX_REPEAT {
            tracing::warn!("repeat count {count} capped at {MAX_REPEAT}");
        }
        let count = count.min(MAX_REPEAT);
        let start = h.hash_get("start").and_then(|v| v.value().as_i64()).unwrap_or(0);
        let step = h.hash_get("step").and_then(|v| v.value().as_i64()).unwrap_or(1);

        let Some(template) = h.template() else {
            return Ok(());
        };

        let block = rc.block().cloned().unwrap_or_else(BlockContext::new);
        rc.push_block(block);

        let mut index = start;
        for i in 0..count {
            if let Some(block) = rc.block_mut() {
                block.set_local_var("index", to_json(index));
                block.set_local_var("first", to_json(i == 0));
                block.set_local_var("last", to_json(i + 1 == count));
            }
            template.render(r, ctx, rc, out)?;
            index = index.saturating_add(step);
        }

        rc.pop_block();
        Ok(())
    }
}

/// Shuffled lorem ipsum sentences: `{{text}}` for one, `{{text 3}}` for three.
pub struct LoremHelper {
    rng: Mutex<StdRng>,
}

impl LoremHelper {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn sentences(&self, count: usize) -> String {
        let mut sentences: Vec<&str> = LOREM.split(SENTENCE_SEPARATOR).collect();
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            sentences.shuffle(&mut *rng);
        }
        sentences.truncate(count);
        sentences.join(SENTENCE_SEPARATOR)
    }
}

impl HelperDef for LoremHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        // Negative or non-numeric counts yield no sentences.
        let count = match h.param(0) {
            Some(p) => as_count(p.value()).unwrap_or(0),
            None => 1,
        };

        out.write(&self.sentences(count))?;
        Ok(())
    }
}

fn param(h: &Helper<'_>, index: usize) -> Json {
    h.param(index).map(|p| p.value().clone()).unwrap_or(Json::Null)
}

fn render_branch<'reg: 'rc, 'rc>(
    condition: bool,
    h: &Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let branch = if condition { h.template() } else { h.inverse() };
    match branch {
        Some(t) => t.render(r, ctx, rc, out),
        None => Ok(()),
    }
}

/// Loose equality: identical values, or a number and a string holding the
/// same number, or a bool against 0/1.
fn loose_eq(a: &Json, b: &Json) -> bool {
    if a == b {
        return true;
    }

    match (a, b) {
        (Json::Number(n), Json::String(s)) | (Json::String(s), Json::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(n), Ok(s)) => n == s,
                _ => false,
            }
        }
        (Json::Bool(flag), Json::Number(n)) | (Json::Number(n), Json::Bool(flag)) => {
            n.as_f64() == Some(if *flag { 1.0 } else { 0.0 })
        }
        _ => false,
    }
}

fn stringify(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.render(),
    }
}

fn as_count(value: &Json) -> Option<usize> {
    match value {
        Json::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
