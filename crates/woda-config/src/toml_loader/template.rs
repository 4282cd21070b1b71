/// The commented config file written on first run.
pub fn default_config_toml() -> &'static str {
    r#"# Woda bridge configuration
schema_version = 1

[bridge]
# Retry interval for frames the transport could not accept (10-60000 ms)
retry_interval_ms = 250
# Frames held while the transport refuses them; the oldest go first (1-1000000)
max_pending_frames = 10000

[filesystem]
# Directory that script-side paths are confined to.
# Leave unset to use your home directory.
# base_path = "/home/me/woda"
create_base = true

[executor]
# Interpreter that evaluates snippets; the snippet is written to stdin.
program = "python3"
args = ["-"]

[workers]
# Concurrent blocking file/process jobs (1-64)
pool_size = 4

[downloads]
# Fallback directory for saved PDFs. Leave unset for the OS download dir.
# directory = "/home/me/Downloads"

[logging]
level = "woda=info"
"#
}
