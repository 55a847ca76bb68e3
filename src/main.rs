use anyhow::Result;
use clap::Parser;
use oncostat::{
    analysis::{self, AnalysisConfig},
    cli::{Cli, OutputFormat},
    render::ChartRenderer,
    report,
};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let regimens = args.regimen_list();
    if regimens.is_empty() {
        anyhow::bail!("Invalid value for --regimens: at least one regimen is required");
    }

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = AnalysisConfig {
        results_path: args.results,
        metadata_path: args.metadata,
        regimens,
        focus_regimen: args.focus_regimen,
        mouse: args.mouse,
    };

    let study = analysis::run(&config)?;

    match args.format {
        OutputFormat::Text => print!("{}", report::render_text(&study)),
        OutputFormat::Json => println!("{}", report::render_json(&study)?),
        OutputFormat::Csv => print!("{}", report::render_csv(&study)),
    }

    if !args.no_charts {
        let renderer = ChartRenderer::new(&args.out_dir)?;
        let written = renderer.render_all(&study.charts);
        for path in &written {
            eprintln!("wrote {}", path.display());
        }
    }

    Ok(())
}
