//! Page expansion.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use minijinja::value::{Object, ValueKind};
use minijinja::{AutoEscape, Environment, ErrorKind, State, Value};

use crate::directive::{self, Node, INCLUDE_FUNCTION};

/// Variables visible to one file while it renders.
pub type Scope = BTreeMap<String, Value>;

/// Name under which a page body is handed to its template.
pub const CONTENT: &str = "content";

/// Context variable holding the [`Frame`] of the file being rendered.
const FRAME: &str = "__frame";

/// Errors that can occur while expanding a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{} doesn't exist{}", path.display(), referenced(referenced_from))]
    MissingFile {
        path: PathBuf,
        referenced_from: Option<PathBuf>,
    },

    #[error("Syntax error in {}: line {line}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: extend is never closed with endextend", path.display())]
    UnclosedExtend { path: PathBuf, line: usize },

    #[error("{}:{line}: endextend without a matching extend", path.display())]
    UnmatchedEndExtend { path: PathBuf, line: usize },

    #[error("{}:{line}: a file can only extend one template", path.display())]
    ExtendTwice { path: PathBuf, line: usize },

    #[error("Include cycle: {}", display_chain(chain))]
    Cycle { chain: Vec<PathBuf> },

    #[error("{}:{line}: `with` must be a map with string keys, got {found}", path.display())]
    Bindings {
        path: PathBuf,
        line: usize,
        found: String,
    },

    #[error("{}: `{name}` is an environment constant and cannot be rebound", path.display())]
    ReadOnlyConstant { path: PathBuf, name: String },

    #[error("Template error in {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn referenced(from: &Option<PathBuf>) -> String {
    from.as_ref()
        .map(|p| format!(" (referenced from {})", p.display()))
        .unwrap_or_default()
}

/// Template expander.
///
/// One expander is shared by every page of a build pass. It holds the
/// environment constants; all per-page state lives in a [`RenderContext`]
/// created for each file. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Expander {
    env: Arc<Environment<'static>>,
    constants: Arc<BTreeSet<String>>,
}

impl Expander {
    /// Create an expander without constants.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_function(INCLUDE_FUNCTION, include);

        Self {
            env: Arc::new(env),
            constants: Arc::default(),
        }
    }

    /// Register read-only globals visible to every page, template and part.
    pub fn with_constants<I, K>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let env = Arc::make_mut(&mut self.env);
        let names = Arc::make_mut(&mut self.constants);
        for (name, value) in constants {
            let name = name.into();
            names.insert(name.clone());
            env.add_global(name, value);
        }
        self
    }

    /// Names of the registered constants.
    pub fn constants(&self) -> impl Iterator<Item = &str> {
        self.constants.iter().map(String::as_str)
    }

    /// Render a page into its final output.
    pub fn render(&self, page: &Path) -> Result<String, RenderError> {
        self.render_file(page, None, Scope::new(), &[])
    }

    fn render_file(
        &self,
        path: &Path,
        referenced_from: Option<&Path>,
        scope: Scope,
        chain: &[PathBuf],
    ) -> Result<String, RenderError> {
        if !path.is_file() {
            return Err(RenderError::MissingFile {
                path: path.to_path_buf(),
                referenced_from: referenced_from.map(Path::to_path_buf),
            });
        }

        let canonical = path.canonicalize().map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut chain = chain.to_vec();
        let is_cycle = chain.contains(&canonical);
        chain.push(canonical);
        if is_cycle {
            return Err(RenderError::Cycle { chain });
        }

        let source = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let nodes = directive::parse(&source).map_err(|e| RenderError::Syntax {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })?;

        tracing::trace!("Rendering {}", path.display());

        self.render_nodes(path, &nodes, RenderContext::new(scope), chain)
    }

    fn render_nodes(
        &self,
        path: &Path,
        nodes: &[Node],
        mut ctx: RenderContext,
        chain: Vec<PathBuf>,
    ) -> Result<String, RenderError> {
        let dir = path.parent().unwrap_or(Path::new(""));
        let frame = Value::from_object(Frame {
            expander: self.clone(),
            path: path.to_path_buf(),
            chain: chain.clone(),
            failure: Mutex::new(None),
        });

        for node in nodes {
            match node {
                Node::Text { source, line } => {
                    let rendered = self.render_text(path, source, *line, &frame, &mut ctx.scope)?;
                    ctx.out.push_str(&rendered);
                }

                Node::Extend {
                    path: template,
                    bindings,
                    line,
                } => {
                    if ctx.extended || ctx.pending.is_some() {
                        return Err(RenderError::ExtendTwice {
                            path: path.to_path_buf(),
                            line: *line,
                        });
                    }
                    let vars = self.eval_bindings(path, bindings.as_deref(), &ctx.scope, *line)?;
                    ctx.begin_extend(dir.join(template), vars, *line);
                }

                Node::EndExtend { line } => {
                    let Some((template, mut vars, body)) = ctx.end_extend() else {
                        return Err(RenderError::UnmatchedEndExtend {
                            path: path.to_path_buf(),
                            line: *line,
                        });
                    };
                    vars.insert(CONTENT.to_string(), Value::from(body));
                    let rendered = self.render_file(&template, Some(path), vars, &chain)?;
                    ctx.out.push_str(&rendered);
                }
            }
        }

        if let Some(pending) = ctx.pending {
            return Err(RenderError::UnclosedExtend {
                path: path.to_path_buf(),
                line: pending.line,
            });
        }

        Ok(ctx.out)
    }

    /// Render one text segment. Variables it sets at the top level are kept
    /// in `scope` for the segments and directives that follow.
    fn render_text(
        &self,
        path: &Path,
        source: &str,
        line: usize,
        frame: &Value,
        scope: &mut Scope,
    ) -> Result<String, RenderError> {
        if !has_expression_syntax(source) {
            return Ok(source.to_string());
        }

        let name = path.display().to_string();
        let padded = pad_to_line(source, line);
        let mut vars = scope.clone();
        vars.insert(FRAME.to_string(), frame.clone());

        let rendered = self
            .env
            .template_from_named_str(&name, &padded)
            .and_then(|template| template.render_captured(&vars));

        let captured = match rendered {
            Ok(captured) => captured,
            Err(source) => {
                return Err(take_failure(frame).unwrap_or_else(|| RenderError::Template {
                    path: path.to_path_buf(),
                    source,
                }))
            }
        };

        let exports: Vec<(String, Value)> = {
            let state = captured.state();
            state
                .exports()
                .into_iter()
                .filter_map(|name| state.lookup(name).map(|value| (name.to_string(), value)))
                .collect()
        };
        for (name, value) in exports {
            self.ensure_writable(path, &name)?;
            scope.insert(name, value);
        }

        Ok(captured.into_output())
    }

    /// Evaluate an `extend`'s `with` expression against the page scope.
    fn eval_bindings(
        &self,
        path: &Path,
        expr: Option<&str>,
        scope: &Scope,
        line: usize,
    ) -> Result<Scope, RenderError> {
        let Some(expr) = expr else {
            return Ok(Scope::new());
        };

        let value = self
            .env
            .compile_expression_owned(expr.to_string())
            .and_then(|compiled| compiled.eval(scope))
            .map_err(|source| RenderError::Template {
                path: path.to_path_buf(),
                source,
            })?;

        self.bindings(path, &value, line)
    }

    /// Turn a `with` value into a fresh scope.
    fn bindings(&self, path: &Path, value: &Value, line: usize) -> Result<Scope, RenderError> {
        if value.is_none() || value.is_undefined() {
            return Ok(Scope::new());
        }

        if value.kind() != ValueKind::Map {
            return Err(RenderError::Bindings {
                path: path.to_path_buf(),
                line,
                found: value.kind().to_string(),
            });
        }

        let template_error = |source| RenderError::Template {
            path: path.to_path_buf(),
            source,
        };

        let mut vars = Scope::new();
        for key in value.try_iter().map_err(template_error)? {
            let Some(name) = key.as_str() else {
                return Err(RenderError::Bindings {
                    path: path.to_path_buf(),
                    line,
                    found: format!("a {} key", key.kind()),
                });
            };
            self.ensure_writable(path, name)?;
            let item = value.get_item(&key).map_err(template_error)?;
            vars.insert(name.to_string(), item);
        }

        Ok(vars)
    }

    fn ensure_writable(&self, path: &Path, name: &str) -> Result<(), RenderError> {
        if self.constants.contains(name) {
            return Err(RenderError::ReadOnlyConstant {
                path: path.to_path_buf(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

fn has_expression_syntax(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Prefix a segment with an empty comment spanning the lines before it, so
/// template errors point at lines of the whole file.
fn pad_to_line(source: &str, line: usize) -> String {
    if line <= 1 {
        return source.to_string();
    }
    format!("{{#{}#}}{source}", "\n".repeat(line - 1))
}

/// The file an `include` call is evaluated from.
#[derive(Debug)]
struct Frame {
    expander: Expander,
    path: PathBuf,
    /// Canonical paths of the files being rendered, outermost first
    chain: Vec<PathBuf>,
    /// First error raised by an include, handed back intact to the caller
    failure: Mutex<Option<RenderError>>,
}

impl Object for Frame {}

impl Frame {
    fn include(
        &self,
        part: &str,
        line: usize,
        bindings: Option<Value>,
        capture: Option<&str>,
    ) -> Result<String, RenderError> {
        if let Some(name) = capture {
            self.expander.ensure_writable(&self.path, name)?;
        }
        let vars = match bindings {
            Some(value) => self.expander.bindings(&self.path, &value, line)?,
            None => Scope::new(),
        };
        let dir = self.path.parent().unwrap_or(Path::new(""));

        self.expander
            .render_file(&dir.join(part), Some(&self.path), vars, &self.chain)
    }

    fn fail(&self, err: RenderError) -> minijinja::Error {
        let error = minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string());
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(err);
        }
        error
    }
}

fn take_failure(frame: &Value) -> Option<RenderError> {
    frame.downcast_object_ref::<Frame>()?.failure.lock().ok()?.take()
}

/// `include` directives compile to calls of this function.
fn include(
    state: &State,
    part: String,
    line: usize,
    bindings: Option<Value>,
    capture: Option<String>,
) -> Result<Value, minijinja::Error> {
    let outside_page = || {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            "include can only be used while expanding a page",
        )
    };
    let handle = state.lookup(FRAME).ok_or_else(outside_page)?;
    let frame = handle.downcast_object_ref::<Frame>().ok_or_else(outside_page)?;

    frame
        .include(&part, line, bindings, capture.as_deref())
        .map(Value::from)
        .map_err(|err| frame.fail(err))
}

/// Per-file render state.
struct RenderContext {
    scope: Scope,
    out: String,
    pending: Option<PendingExtend>,
    extended: bool,
}

/// An `extend` waiting for its `endextend`.
struct PendingExtend {
    template: PathBuf,
    vars: Scope,
    /// Output produced before the `extend`
    outer: String,
    line: usize,
}

impl RenderContext {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            out: String::new(),
            pending: None,
            extended: false,
        }
    }

    fn begin_extend(&mut self, template: PathBuf, vars: Scope, line: usize) {
        let outer = mem::take(&mut self.out);
        self.pending = Some(PendingExtend {
            template,
            vars,
            outer,
            line,
        });
    }

    /// Close the pending extend, returning the template, its variables and
    /// the buffered body.
    fn end_extend(&mut self) -> Option<(PathBuf, Scope, String)> {
        let PendingExtend {
            template,
            vars,
            outer,
            ..
        } = self.pending.take()?;
        let body = mem::replace(&mut self.out, outer);
        self.extended = true;
        Some((template, vars, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn site(files: &[(&str, &str)]) -> TempDir {
        let temp = tempdir().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    #[test]
    fn plain_page_renders_verbatim() {
        let raw = "<!DOCTYPE html>\n<p>Hello & welcome { not a tag }</p>\n\n";
        let temp = site(&[("index.html", raw)]);

        let out = Expander::new().render(&temp.path().join("index.html")).unwrap();

        assert_eq!(out, raw);
    }

    #[test]
    fn extends_template_with_content() {
        let temp = site(&[
            (
                "a.html",
                r#"{% extend "tpl.html" with {"title": "Hi"} %}body{% endextend %}"#,
            ),
            ("tpl.html", "<h1>{{ title }}</h1>{{ content }}"),
        ]);

        let out = Expander::new().render(&temp.path().join("a.html")).unwrap();

        assert_eq!(out, "<h1>Hi</h1>body");
    }

    #[test]
    fn keeps_text_around_extend_block() {
        let temp = site(&[
            (
                "page.html",
                "before|{% extend \"t.html\" %}mid{% endextend %}|after\n",
            ),
            ("t.html", "[{{ content }}]"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "before|[mid]|after\n");
    }

    #[test]
    fn body_wins_over_content_binding() {
        let temp = site(&[
            (
                "page.html",
                r#"{% extend "t.html" with {"content": "ignored"} %}real{% endextend %}"#,
            ),
            ("t.html", "{{ content }}"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "real");
    }

    #[test]
    fn does_not_escape_html() {
        let temp = site(&[
            (
                "page.html",
                r#"{% extend "t.html" %}<b>bold</b>{% endextend %}"#,
            ),
            ("t.html", "<main>{{ content }}</main>"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "<main><b>bold</b></main>");
    }

    #[test]
    fn nested_includes_resolve_from_including_file() {
        let temp = site(&[
            (
                "pages/index.html",
                r#"{% include "../parts/header.html" with {"title": "Home"} %}"#,
            ),
            (
                "parts/header.html",
                r#"<header>{{ title }}{% include "nav/links.html" %}</header>"#,
            ),
            ("parts/nav/links.html", "<nav></nav>"),
        ]);

        let out = Expander::new()
            .render(&temp.path().join("pages/index.html"))
            .unwrap();

        assert_eq!(out, "<header>Home<nav></nav></header>");
    }

    #[test]
    fn part_scopes_are_isolated() {
        let temp = site(&[
            (
                "page.html",
                r#"{% include "a.html" with {"secret": "A"} %}|{% include "b.html" %}"#,
            ),
            ("a.html", "{{ secret }}"),
            ("b.html", "[{{ secret }}]"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "A|[]");
    }

    #[test]
    fn page_variables_do_not_leak_into_parts() {
        let temp = site(&[
            (
                "page.html",
                r#"{% include "a.html" with {"x": "1"} as first %}{% include "b.html" %}"#,
            ),
            ("a.html", "{{ x }}"),
            ("b.html", "[{{ first }}]"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "[]");
    }

    #[test]
    fn captured_include_is_not_emitted() {
        let temp = site(&[
            (
                "page.html",
                r#"{% include "nav.html" with {"active": "home"} as nav %}<body>{{ nav }}</body>"#,
            ),
            ("nav.html", "<nav>{{ active }}</nav>"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "<body><nav>home</nav></body>");
    }

    #[test]
    fn passes_captured_part_to_template() {
        let temp = site(&[
            (
                "page.html",
                concat!(
                    r#"{% include "nav.html" as nav %}"#,
                    r#"{% extend "layout.html" with {"nav": nav} %}text{% endextend %}"#
                ),
            ),
            ("nav.html", "<nav/>"),
            ("layout.html", "{{ nav }}{{ content }}"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "<nav/>text");
    }

    #[test]
    fn templates_can_extend_templates() {
        let temp = site(&[
            (
                "page.html",
                r#"{% extend "post.html" with {"title": "T"} %}words{% endextend %}"#,
            ),
            (
                "post.html",
                r#"{% extend "base.html" with {"title": title} %}<article>{{ content }}</article>{% endextend %}"#,
            ),
            ("base.html", "<title>{{ title }}</title>{{ content }}"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "<title>T</title><article>words</article>");
    }

    #[test]
    fn constants_are_global() {
        let temp = site(&[
            (
                "page.html",
                r#"{{ SITE_URL }}|{% include "p.html" %}|{% extend "t.html" %}{% endextend %}"#,
            ),
            ("p.html", "{{ SITE_URL }}"),
            ("t.html", "{{ SITE_URL }}"),
        ]);

        let expander =
            Expander::new().with_constants([("SITE_URL", Value::from("https://example.com"))]);
        let out = expander.render(&temp.path().join("page.html")).unwrap();

        assert_eq!(
            out,
            "https://example.com|https://example.com|https://example.com"
        );
        assert_eq!(expander.constants().collect::<Vec<_>>(), vec!["SITE_URL"]);
    }

    #[test]
    fn constants_cannot_be_rebound() {
        let temp = site(&[
            ("page.html", r#"{% include "p.html" with {"PROD": false} %}"#),
            ("p.html", ""),
        ]);

        let err = Expander::new()
            .with_constants([("PROD", Value::from(true))])
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::ReadOnlyConstant { ref name, .. } if name == "PROD"));
    }

    #[test]
    fn missing_part_names_path_and_referrer() {
        let temp = site(&[("page.html", r#"{% include "nope.html" %}"#)]);
        let page = temp.path().join("page.html");

        let err = Expander::new().render(&page).unwrap_err();

        match &err {
            RenderError::MissingFile {
                path,
                referenced_from,
            } => {
                assert_eq!(path, &temp.path().join("nope.html"));
                assert_eq!(referenced_from.as_deref(), Some(page.as_path()));
            }
            other => panic!("expected MissingFile, got {other:?}"),
        }
        assert!(err.to_string().contains("nope.html"));
    }

    #[test]
    fn missing_template_is_reported() {
        let temp = site(&[(
            "page.html",
            r#"{% extend "layout.html" %}x{% endextend %}"#,
        )]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::MissingFile { .. }));
    }

    #[test]
    fn missing_page_is_reported() {
        let temp = tempdir().unwrap();

        let err = Expander::new()
            .render(&temp.path().join("gone.html"))
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::MissingFile {
                referenced_from: None,
                ..
            }
        ));
    }

    #[test]
    fn unclosed_extend_is_an_error() {
        let temp = site(&[
            ("page.html", "\n{% extend \"t.html\" %}body"),
            ("t.html", "{{ content }}"),
        ]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::UnclosedExtend { line: 2, .. }));
    }

    #[test]
    fn stray_endextend_is_an_error() {
        let temp = site(&[("page.html", "body{% endextend %}")]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::UnmatchedEndExtend { line: 1, .. }));
    }

    #[test]
    fn second_extend_is_an_error() {
        let temp = site(&[
            (
                "page.html",
                r#"{% extend "t.html" %}a{% endextend %}{% extend "t.html" %}b{% endextend %}"#,
            ),
            ("t.html", "{{ content }}"),
        ]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::ExtendTwice { .. }));
    }

    #[test]
    fn detects_include_cycles() {
        let temp = site(&[
            ("a.html", r#"{% include "b.html" %}"#),
            ("b.html", r#"{% include "a.html" %}"#),
        ]);

        let err = Expander::new()
            .render(&temp.path().join("a.html"))
            .unwrap_err();

        match err {
            RenderError::Cycle { chain } => assert_eq!(chain.len(), 3),
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn with_must_be_a_map() {
        let temp = site(&[
            ("page.html", r#"{% include "p.html" with [1, 2] %}"#),
            ("p.html", ""),
        ]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::Bindings { .. }));
    }

    #[test]
    fn syntax_errors_carry_file_and_line() {
        let temp = site(&[("page.html", "ok\n\n{% include nothing %}")]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::Syntax { line: 3, .. }));
    }

    #[test]
    fn includes_inside_loops() {
        let temp = site(&[
            (
                "page.html",
                r#"{% for i in [1, 2] %}{% include "card.html" with {"i": i} %}{% endfor %}"#,
            ),
            ("card.html", "<li>{{ i }}</li>"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "<li>1</li><li>2</li>");
    }

    #[test]
    fn includes_inside_conditionals() {
        let temp = site(&[
            (
                "page.html",
                concat!(
                    r#"{% if true %}{% include "yes.html" %}{% endif %}"#,
                    r#"{% if false %}{% include "missing.html" %}{% endif %}"#
                ),
            ),
            ("yes.html", "yes"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "yes");
    }

    #[test]
    fn missing_part_inside_loop_is_reported() {
        let temp = site(&[(
            "page.html",
            r#"{% for i in [1] %}{% include "gone.html" %}{% endfor %}"#,
        )]);

        let err = Expander::new()
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::MissingFile { .. }));
    }

    #[test]
    fn commented_out_include_is_ignored() {
        let temp = site(&[("page.html", r#"a{# {% include "old.html" %} #}b"#)]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "ab");
    }

    #[test]
    fn top_level_sets_reach_the_template() {
        let temp = site(&[
            (
                "page.html",
                r#"{% set title = "About" %}{% extend "t.html" with {"title": title} %}x{% endextend %}"#,
            ),
            ("t.html", "{{ title }}:{{ content }}"),
        ]);

        let out = Expander::new().render(&temp.path().join("page.html")).unwrap();

        assert_eq!(out, "About:x");
    }

    #[test]
    fn capture_cannot_rebind_constant() {
        let temp = site(&[
            ("page.html", r#"{% include "p.html" as SITE %}"#),
            ("p.html", ""),
        ]);

        let err = Expander::new()
            .with_constants([("SITE", Value::from("x"))])
            .render(&temp.path().join("page.html"))
            .unwrap_err();

        assert!(matches!(err, RenderError::ReadOnlyConstant { ref name, .. } if name == "SITE"));
    }

    #[test]
    fn template_errors_report_file_lines() {
        let temp = site(&[
            (
                "page.html",
                "a\n{% extend \"t.html\" %}\nb\n{{ 1 + }}\n{% endextend %}",
            ),
            ("t.html", "{{ content }}"),
        ]);
        let page = temp.path().join("page.html");

        let err = Expander::new().render(&page).unwrap_err();

        match err {
            RenderError::Template { path, source } => {
                assert_eq!(path, page);
                assert_eq!(source.line(), Some(4));
                assert_eq!(source.name(), Some(page.display().to_string().as_str()));
            }
            other => panic!("expected Template, got {other:?}"),
        }
    }
}
