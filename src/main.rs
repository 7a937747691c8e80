use pipesh::Interpreter;
use pipesh::config::ShellConfig;
use pipesh::logging;

fn main() -> anyhow::Result<()> {
    let config = ShellConfig::from_env();
    logging::init(config.log_level);

    let code = Interpreter::new(config).repl()?;
    std::process::exit(code);
}
