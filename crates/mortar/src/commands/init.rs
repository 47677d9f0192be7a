//! Scaffold a new site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the current directory.
const SCAFFOLD: [(&str, &str); 7] = [
    ("mortar.toml", DEFAULT_CONFIG),
    ("env.toml", DEFAULT_ENV),
    ("env.prod.toml", DEFAULT_ENV_PROD),
    ("src/pages/index.html", DEFAULT_INDEX),
    ("src/templates/layout.html", DEFAULT_LAYOUT),
    ("src/parts/header.html", DEFAULT_HEADER),
    ("public/css/site.css", DEFAULT_CSS),
];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing mortar...");
    scaffold(Path::new("."), yes)?;
    tracing::info!("Initialization complete!");
    tracing::info!("Run 'mortar dev' to start the development server.");
    Ok(())
}

fn scaffold(root: &Path, yes: bool) -> Result<()> {
    if root.join("src").exists() && !yes {
        tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for (relative, content) in SCAFFOLD {
        let path = root.join(relative);
        if path.exists() && !yes {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
    }

    ignore_state_file(root)
}

/// Keep the watcher's state file out of version control.
fn ignore_state_file(root: &Path) -> Result<()> {
    let gitignore = root.join(".gitignore");
    let entry = format!("public/{}", mortar_server::STATE_FILE);

    let existing = if gitignore.exists() {
        fs::read_to_string(&gitignore).context("Failed to read .gitignore")?
    } else {
        String::new()
    };

    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&entry);
    updated.push('\n');

    fs::write(&gitignore, updated).context("Failed to write .gitignore")?;
    tracing::info!("Added {} to .gitignore", entry);
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Mortar Configuration

[site]
# Page sources; every file directly in here becomes one output file
pages = "src/pages"

# Output directory
output = "public"

# Extension of page files
extension = "html"

[env]
# Constants for `mortar build` and `mortar dev`
dev = "env.toml"

# Constants for `mortar build --prod`
prod = "env.prod.toml"

[watch]
# Directories polled by `mortar dev`
dirs = ["src"]
interval_ms = 1000
host = "127.0.0.1"
"#;

const DEFAULT_ENV: &str = r#"# Development constants. These end up in the built HTML: nothing secret.
SITE_NAME = "My Site"
LIVE_RELOAD = true
"#;

const DEFAULT_ENV_PROD: &str = r#"# Production constants. These end up in the built HTML: nothing secret.
SITE_NAME = "My Site"
LIVE_RELOAD = false
"#;

const DEFAULT_INDEX: &str = r#"{% extend "../templates/layout.html" with {"title": "Home"} %}
<p>Edit <code>src/pages/index.html</code> and save. The page reloads by itself.</p>
{% endextend %}
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }} | {{ SITE_NAME }}</title>
  <link rel="stylesheet" href="/css/site.css">
</head>
<body>
  {% include "../parts/header.html" with {"title": title} %}
  <main>{{ content }}</main>
{% if LIVE_RELOAD %}  <script src="/__live.js"></script>
{% endif %}</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header>
  <h1>{{ title }}</h1>
</header>
"#;

const DEFAULT_CSS: &str = r#"body {
  font-family: system-ui, sans-serif;
  max-width: 800px;
  margin: 2rem auto;
  padding: 0 1rem;
}
"#;
