use std::path::{Path, PathBuf};

pub type InitResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Register the server under this key in client configs.
const SERVER_KEY: &str = "mermaider";

/// Write project-scoped MCP config files in the current directory so that
/// Claude Code and/or Codex discover mermaider-mcp when working in this
/// project. Only writes config for tools that are actually installed.
pub fn init_project() -> InitResult<()> {
    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();

    let cwd = std::env::current_dir()?;
    let written = init_in(&cwd, &binary_path, which("claude"), which("codex"))?;

    for path in &written {
        eprintln!("Wrote {}", path.display());
    }
    eprintln!("\nDone. Diagram tools are available in this project.");
    Ok(())
}

/// Write config for the detected clients and return the files touched.
pub fn init_in(
    cwd: &Path,
    binary_path: &str,
    has_claude: bool,
    has_codex: bool,
) -> InitResult<Vec<PathBuf>> {
    if !has_claude && !has_codex {
        return Err("Neither `claude` nor `codex` found in PATH. \
Install Claude Code or OpenAI Codex first, then re-run `mermaider-mcp init`."
            .into());
    }

    let mut written = Vec::new();
    if has_claude {
        written.push(init_claude_code(cwd, binary_path)?);
    }
    if has_codex {
        written.push(init_codex(cwd, binary_path)?);
    }
    Ok(written)
}

fn which(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

/// Existing client config is never replaced when it cannot be merged.
fn unreadable(path: &Path, reason: &str) -> Box<dyn std::error::Error> {
    format!(
        "Cannot update {}: {}. Fix or remove the file, then re-run `mermaider-mcp init`.",
        path.display(),
        reason
    )
    .into()
}

/// Write .mcp.json for Claude Code, merging with any existing config.
fn init_claude_code(cwd: &Path, binary_path: &str) -> InitResult<PathBuf> {
    let mcp_json_path = cwd.join(".mcp.json");
    let mut root: serde_json::Value = if mcp_json_path.exists() {
        let contents = std::fs::read_to_string(&mcp_json_path)?;
        serde_json::from_str(&contents)
            .map_err(|e| unreadable(&mcp_json_path, &e.to_string()))?
    } else {
        serde_json::json!({})
    };
    if !root.is_object() {
        return Err(unreadable(&mcp_json_path, "top level is not a JSON object"));
    }

    let servers_ok = root.get("mcpServers").map(|v| v.is_object());
    if servers_ok == Some(false) {
        return Err(unreadable(&mcp_json_path, "`mcpServers` is not an object"));
    }
    if servers_ok.is_none() {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_KEY] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });

    std::fs::write(&mcp_json_path, serde_json::to_string_pretty(&root)?)?;
    Ok(mcp_json_path)
}

/// Write .codex/config.toml for OpenAI Codex, merging with any existing config.
fn init_codex(cwd: &Path, binary_path: &str) -> InitResult<PathBuf> {
    let codex_dir = cwd.join(".codex");
    let config_toml_path = codex_dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = if config_toml_path.exists() {
        std::fs::read_to_string(&config_toml_path)?
            .parse()
            .map_err(|e: toml_edit::TomlError| unreadable(&config_toml_path, &e.to_string()))?
    } else {
        toml_edit::DocumentMut::new()
    };

    if !doc.contains_key("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    } else if !doc.contains_table("mcp_servers") {
        return Err(unreadable(&config_toml_path, "`mcp_servers` is not a table"));
    }

    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    doc["mcp_servers"][SERVER_KEY] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&codex_dir)?;
    std::fs::write(&config_toml_path, doc.to_string())?;
    Ok(config_toml_path)
}
