//! MCP server entry handed to agent queries.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Key of the single server entry.
pub const MCP_SERVER_NAME: &str = "wrangler-mcp";

/// `<root>/node_modules/.wrangler/mcp/dist/bundle.cjs`
pub fn default_server_path(project_root: &Path) -> PathBuf {
    project_root
        .join("node_modules")
        .join(".wrangler")
        .join("mcp")
        .join("dist")
        .join("bundle.cjs")
}

/// Build the `mcpServers` map with one stdio server rooted at `project_root`.
pub fn build_mcp_config(project_root: &Path, server_path: Option<&Path>) -> Value {
    let server_path = server_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_server_path(project_root));

    json!({
        MCP_SERVER_NAME: {
            "type": "stdio",
            "command": "node",
            "args": [server_path.to_string_lossy()],
            "env": {
                "WORKSPACE_ROOT": project_root.to_string_lossy(),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_path() {
        let config = build_mcp_config(Path::new("/work/project"), None);
        let server = &config[MCP_SERVER_NAME];
        assert_eq!(server["type"], "stdio");
        assert_eq!(server["command"], "node");
        assert_eq!(
            server["args"],
            json!(["/work/project/node_modules/.wrangler/mcp/dist/bundle.cjs"])
        );
        assert_eq!(server["env"]["WORKSPACE_ROOT"], "/work/project");
    }

    #[test]
    fn test_server_path_override() {
        let config = build_mcp_config(
            Path::new("/work/project"),
            Some(Path::new("/opt/mcp/server.cjs")),
        );
        assert_eq!(config[MCP_SERVER_NAME]["args"], json!(["/opt/mcp/server.cjs"]));
        assert_eq!(config[MCP_SERVER_NAME]["env"]["WORKSPACE_ROOT"], "/work/project");
    }

    #[test]
    fn test_single_entry() {
        let config = build_mcp_config(Path::new("/p"), None);
        assert_eq!(config.as_object().unwrap().len(), 1);
    }
}
