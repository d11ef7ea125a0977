use anyhow::Result;
use clap::{Arg, Command};
use colored::*;
use std::path::PathBuf;
use std::time::Duration;

use hector_ide::{
    config::Config,
    exporter::{self, ExportOptions},
    pipeline::{GenerationRequest, PipelineOrchestrator, QaRequest},
    providers::LLMProvider,
    reconciler::ProjectEntry,
    resolver::LlmAssist,
    store::DocumentStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("hector")
        .version("0.1.0")
        .about("Generate a full application from an idea - outline, specification, code, and an exported project tree")
        .subcommand_required(true)
        .subcommand(
            Command::new("generate")
                .about("Run the generation pipeline for an application idea")
                .arg(
                    Arg::new("idea")
                        .help("What the application should do")
                        .required(true)
                        .index(1)
                )
                .arg(
                    Arg::new("title")
                        .long("title")
                        .help("Document title for the generated phases")
                        .required(true)
                )
                .arg(
                    Arg::new("language")
                        .long("language")
                        .help("Implementation language for the generated code")
                        .default_value("JavaScript")
                )
                .arg(
                    Arg::new("chapters")
                        .long("chapters")
                        .help("Number of chapters to break the application into")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5")
                )
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .help("Directory holding the document store")
                        .default_value(".")
                )
        )
        .subcommand(
            Command::new("qa")
                .about("Generate a test suite for a generated code document")
                .arg(
                    Arg::new("title")
                        .help("Title of the code document to write tests for")
                        .required(true)
                        .index(1)
                )
                .arg(
                    Arg::new("test-type")
                        .long("test-type")
                        .help("Kind of tests to generate (unit, integration, api, ...)")
                        .default_value("unit")
                )
                .arg(
                    Arg::new("language")
                        .long("language")
                        .help("Language to write the tests in")
                        .default_value("JavaScript")
                )
                .arg(
                    Arg::new("framework")
                        .long("framework")
                        .help("Test framework to target (defaults to the language's standard tools)")
                )
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .help("Directory holding the document store")
                        .default_value(".")
                )
        )
        .subcommand(
            Command::new("export")
                .about("Materialize a generated code document as a project tree on disk")
                .arg(
                    Arg::new("title")
                        .help("Title of the code document to export")
                        .required(true)
                        .index(1)
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .help("Directory to write the project into")
                        .default_value("generated")
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Fail instead of degrading when a chapter cannot be placed")
                        .action(clap::ArgAction::SetTrue)
                )
                .arg(
                    Arg::new("call-delay")
                        .long("call-delay")
                        .help("Seconds to wait between individual path resolution calls")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("6")
                )
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .help("Directory holding the document store")
                        .default_value(".")
                )
        )
        .subcommand(
            Command::new("show")
                .about("Preview where a code document's chapters would land, without writing anything")
                .arg(
                    Arg::new("title")
                        .help("Title of the code document to preview")
                        .required(true)
                        .index(1)
                )
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .help("Directory holding the document store")
                        .default_value(".")
                )
        )
        .subcommand(
            Command::new("list")
                .about("List the documents in the store")
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .help("Directory holding the document store")
                        .default_value(".")
                )
        )
        .subcommand(
            Command::new("config")
                .about("Configuration management")
                .subcommand(
                    Command::new("edit")
                        .about("Edit the configuration interactively")
                )
                .subcommand(
                    Command::new("show")
                        .about("Show current configuration")
                )
                .subcommand(
                    Command::new("reset")
                        .about("Reset configuration (will prompt for new settings)")
                )
        )
        .get_matches();

    match matches.subcommand() {
        Some(("generate", sub_matches)) => run_generate_command(sub_matches).await?,
        Some(("qa", sub_matches)) => run_qa_command(sub_matches).await?,
        Some(("export", sub_matches)) => run_export_command(sub_matches).await?,
        Some(("show", sub_matches)) => run_show_command(sub_matches).await?,
        Some(("list", sub_matches)) => run_list_command(sub_matches)?,
        Some(("config", sub_matches)) => run_config_command(sub_matches).await?,
        _ => unreachable!(),
    }

    Ok(())
}

fn workspace_dir(matches: &clap::ArgMatches) -> PathBuf {
    PathBuf::from(matches.get_one::<String>("workspace").unwrap())
}

async fn run_generate_command(matches: &clap::ArgMatches) -> Result<()> {
    let workspace = workspace_dir(matches);
    let idea = matches.get_one::<String>("idea").unwrap().clone();
    let title = matches.get_one::<String>("title").unwrap().clone();
    let language = matches.get_one::<String>("language").unwrap().clone();
    let chapter_count = *matches.get_one::<usize>("chapters").unwrap();

    println!("{}", "🏗  Hector IDE".cyan().bold());
    println!("Idea: {}\n", idea.yellow());

    println!("{}", "Setting up AI provider...".green());
    let provider = LLMProvider::new().await?;
    println!(
        "\nUsing: {} with model {}\n",
        format!("{}", provider.get_provider()).cyan(),
        provider.get_model_name().yellow()
    );

    let store = DocumentStore::open_or_create(&workspace)?;
    let orchestrator = PipelineOrchestrator::new(&provider, &store);
    let request = GenerationRequest {
        idea,
        title,
        language,
        chapter_count,
    };

    match orchestrator.run(&request).await {
        Ok(code_title) => {
            println!("\n{}", "🎉 Generation complete!".green().bold());
            println!("Export it with: hector export \"{code_title}\"");
        }
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);

            if e.to_string().contains("API_KEY") {
                eprintln!("\n{}", "💡 Tip: Make sure to set your API key:".yellow());
                eprintln!("  export OPENAI_API_KEY=your_key_here");
            }

            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run_qa_command(matches: &clap::ArgMatches) -> Result<()> {
    let workspace = workspace_dir(matches);
    let code_title = matches.get_one::<String>("title").unwrap().clone();
    let test_type = matches.get_one::<String>("test-type").unwrap().clone();
    let language = matches.get_one::<String>("language").unwrap().clone();
    let framework = matches.get_one::<String>("framework").cloned();

    let store = open_existing_store(&workspace)?;

    println!("{}", "Setting up AI provider...".green());
    let provider = LLMProvider::new().await?;

    let orchestrator = PipelineOrchestrator::new(&provider, &store);
    let request = QaRequest {
        code_title,
        test_type,
        language,
        framework,
    };

    match orchestrator.run_qa(&request).await {
        Ok(qa_title) => {
            println!("\n{}", "🎉 Test suite generated!".green().bold());
            println!("Export it with: hector export \"{qa_title}\"");
        }
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn open_existing_store(workspace: &PathBuf) -> Result<DocumentStore> {
    if !DocumentStore::exists(workspace) {
        eprintln!(
            "{}: No document store in {}. Run 'hector generate' first.",
            "Error".red().bold(),
            workspace.display()
        );
        std::process::exit(1);
    }
    DocumentStore::open_or_create(workspace)
}

async fn run_export_command(matches: &clap::ArgMatches) -> Result<()> {
    let workspace = workspace_dir(matches);
    let title = matches.get_one::<String>("title").unwrap();
    let output = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let strict = matches.get_flag("strict");
    let call_delay = Duration::from_secs(*matches.get_one::<u64>("call-delay").unwrap());

    let store = open_existing_store(&workspace)?;
    let Some(document) = store.get_document(title)? else {
        eprintln!("{}: No document titled '{}'", "Error".red().bold(), title);
        std::process::exit(1);
    };

    let provider = LLMProvider::new().await?;
    let assist = LlmAssist::new(&provider);
    let options = ExportOptions { strict, call_delay };

    match exporter::export_document(&document, &output, &assist, &options).await {
        Ok(summary) => {
            println!(
                "\n{} {} files and {} folders under {}",
                "Exported".green().bold(),
                summary.files_written,
                summary.folders_created,
                output.display().to_string().yellow()
            );
        }
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run_show_command(matches: &clap::ArgMatches) -> Result<()> {
    let workspace = workspace_dir(matches);
    let title = matches.get_one::<String>("title").unwrap();

    let store = open_existing_store(&workspace)?;
    let Some(document) = store.get_document(title)? else {
        eprintln!("{}: No document titled '{}'", "Error".red().bold(), title);
        std::process::exit(1);
    };

    // Offline preview: tree matching only, no LLM calls.
    let plan = exporter::plan_preview(&document).await?;

    println!("{}", "Planned layout:".green().bold());
    for (path, entry) in &plan.code_map {
        match entry {
            ProjectEntry::File(content) => {
                println!("  {path} ({} bytes)", content.len());
            }
            ProjectEntry::Folder => println!("  {path}/"),
        }
    }
    if !plan.unresolved.is_empty() {
        println!(
            "\n{}: {} chapter(s) need LLM path resolution during export:",
            "Note".yellow(),
            plan.unresolved.len()
        );
        for chapter in &plan.unresolved {
            println!("  {chapter}");
        }
    }

    Ok(())
}

fn run_list_command(matches: &clap::ArgMatches) -> Result<()> {
    let workspace = workspace_dir(matches);
    let store = open_existing_store(&workspace)?;

    let documents = store.list_documents()?;
    if documents.is_empty() {
        println!("{}", "The document store is empty.".yellow());
        return Ok(());
    }

    println!("{}", "Documents:".green().bold());
    for doc in documents {
        println!(
            "  {} [{}] created {}",
            doc.title.cyan(),
            doc.doc_type,
            doc.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

async fn run_config_command(matches: &clap::ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("edit", _)) => {
            config_edit().await?;
        }
        Some(("show", _)) => {
            config_show()?;
        }
        Some(("reset", _)) => {
            config_reset()?;
        }
        None => {
            println!("{}", "Configuration Management".cyan().bold());
            println!("Available commands:");
            println!("  edit  - Edit configuration interactively");
            println!("  show  - Show current configuration");
            println!("  reset - Reset configuration");
            println!("\nUse 'hector config --help' for more information");
        }
        _ => unreachable!(),
    }

    Ok(())
}

async fn config_edit() -> Result<()> {
    println!("{}", "🔧 Configuration Editor".cyan().bold());

    // new_interactive persists its selection.
    let provider = LLMProvider::new_interactive().await?;

    println!(
        "{} {} with model {}",
        "✅ Configured".green().bold(),
        format!("{}", provider.get_provider()).cyan(),
        provider.get_model_name().yellow()
    );

    Ok(())
}

fn config_show() -> Result<()> {
    println!("{}", "📋 Current Configuration".cyan().bold());

    match Config::load()? {
        Some(config) => {
            println!("Provider: {}", format!("{}", config.provider).green());
            println!("Model: {}", config.model_name.green());

            let config_path = Config::file_path()?;
            println!("Config file: {}", config_path.display().to_string().yellow());
        }
        None => {
            println!(
                "{}",
                "No configuration found. Run 'hector config edit' to create one.".yellow()
            );
        }
    }

    Ok(())
}

fn config_reset() -> Result<()> {
    use dialoguer::{theme::ColorfulTheme, Confirm};

    let config_path = Config::file_path()?;

    if !config_path.exists() {
        println!("{}", "No configuration file found.".yellow());
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Are you sure you want to reset the configuration?")
        .default(false)
        .interact()?;

    if confirmed {
        Config::reset()?;
        println!("{}", "✅ Configuration reset successfully!".green().bold());
        println!("Next generation run will prompt for a provider and model.");
    } else {
        println!("Configuration reset cancelled.");
    }

    Ok(())
}
