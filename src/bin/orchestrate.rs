use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use orchestrate::cli::{compile_definition, list_tools, render_document, validate_definition, ToolListEntry};
use orchestrate::LoggingConfig;

#[derive(Parser)]
#[command(name = "orchestrate", version, about = "Flow builder CLI", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

#[derive(Subcommand)]
enum FlowCommand {
    /// Compile a flow definition into its wire document
    Compile {
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print validation findings for a flow definition
    Validate { file: PathBuf },
}

#[derive(Subcommand)]
enum ToolsCommand {
    /// List the tools declared by a flow definition
    List { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Flow { command } => match command {
            FlowCommand::Compile {
                file,
                output,
                pretty,
            } => handle_flow_compile(file, output, pretty)?,
            FlowCommand::Validate { file } => handle_flow_validate(file)?,
        },
        Command::Tools { command } => match command {
            ToolsCommand::List { file } => handle_tools_list(file)?,
        },
    }
    Ok(())
}

fn handle_flow_compile(file: PathBuf, output: Option<PathBuf>, pretty: bool) -> anyhow::Result<()> {
    let document = compile_definition(&file)?;
    let content = render_document(&document, pretty)?;

    if let Some(path) = output {
        fs::write(&path, content)?;
        println!("Flow compiled to `{}`", path.display());
    } else {
        println!("{content}");
    }
    Ok(())
}

fn handle_flow_validate(file: PathBuf) -> anyhow::Result<()> {
    let findings = validate_definition(&file)?;
    if findings.is_empty() {
        println!("`{}` is valid", file.display());
    } else {
        for finding in &findings {
            println!("{finding}");
        }
    }
    if findings.iter().any(|finding| finding.is_error()) {
        anyhow::bail!("validation failed for `{}`", file.display());
    }
    Ok(())
}

fn handle_tools_list(file: PathBuf) -> anyhow::Result<()> {
    let tools = list_tools(&file)?;
    if tools.is_empty() {
        println!("No tools declared in `{}`", file.display());
    } else {
        render_tool_table(&tools);
    }
    Ok(())
}

fn render_tool_table(tools: &[ToolListEntry]) {
    println!("{:<32} {:<32} {}", "Name", "Display name", "Description");
    for tool in tools {
        println!(
            "{:<32} {:<32} {}",
            tool.name, tool.display_name, tool.description
        );
    }
}
