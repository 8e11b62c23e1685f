use super::{colorize_kind, json_pretty, CommandError, EXIT_SUCCESS};
use console::Style;
use localstyle_core::{LocalStyleHolder, ModuleStyleCollector, Problem, ProblemsHolder};
use localstyle_host::{
    AssetCounter, ComponentReferenceCounter, Fixture, StringRegistry, TextCssCompiler,
    WriterSinks,
};
use localstyle_schema::{parse_config_file, CollectorConfig, ModuleName};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct CollectOutcome {
    pub module: String,
    pub sdk: String,
    pub holders: Option<Vec<LocalStyleHolder>>,
    pub problems: Vec<Problem>,
    pub interned_strings: usize,
    pub component_references: usize,
    pub assets: usize,
}

pub fn collect_outcome(
    fixture: &Path,
    module: &str,
    sdk: &str,
    config: Option<&Path>,
) -> Result<CollectOutcome, CommandError> {
    let config = match config {
        Some(path) => parse_config_file(path).map_err(CommandError::input)?,
        None => CollectorConfig::default(),
    };
    let host = Fixture::load(fixture)
        .map_err(CommandError::input)?
        .into_host();
    debug!("loaded fixture {}", fixture.display());

    let mut strings = StringRegistry::new();
    let mut components = ComponentReferenceCounter::new();
    let mut assets = AssetCounter::new();
    let mut problems = ProblemsHolder::new();
    let holders = {
        let mut compiler = TextCssCompiler::new(WriterSinks {
            strings: &mut strings,
            components: &mut components,
            assets: &mut assets,
        });
        ModuleStyleCollector::new(&host, config)
            .collect(&ModuleName::new(module), sdk, &mut compiler, &mut problems)
            .map_err(CommandError::collect)?
    };

    Ok(CollectOutcome {
        module: module.to_owned(),
        sdk: sdk.to_owned(),
        holders,
        problems: problems.into_problems(),
        interned_strings: strings.len(),
        component_references: components.total(),
        assets: assets.total(),
    })
}

pub fn run(
    fixture: &Path,
    module: &str,
    sdk: &str,
    config: Option<&Path>,
    json: bool,
) -> Result<u8, CommandError> {
    let outcome = collect_outcome(fixture, module, sdk, config)?;
    if json {
        println!("{}", json_pretty(&outcome)?);
    } else {
        print_human(&outcome);
    }
    Ok(EXIT_SUCCESS)
}

fn print_human(outcome: &CollectOutcome) {
    let dim = Style::new().dim();
    match &outcome.holders {
        None => println!(
            "{}: {}",
            outcome.module,
            dim.apply_to("nothing to style")
        ),
        Some(holders) => {
            println!(
                "{}: {} local style holders (SDK {})",
                outcome.module,
                holders.len(),
                outcome.sdk
            );
            for holder in holders {
                let digest = holder.digest();
                println!(
                    "  {:<8} {}  {} bytes  {}",
                    colorize_kind(holder.kind()),
                    holder.file,
                    holder.data.len(),
                    dim.apply_to(&digest[..12])
                );
                for user in holder.users() {
                    println!("           used by {user}");
                }
            }
            println!(
                "  {} strings, {} component references, {} assets",
                outcome.interned_strings, outcome.component_references, outcome.assets
            );
        }
    }
    let warning = Style::new().yellow();
    for problem in &outcome.problems {
        println!("{} {problem}", warning.apply_to("warning:"));
    }
}
