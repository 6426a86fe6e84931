/// MapScope report
///
/// Loads the dataset named by MAPSCOPE_DATA (or the default file) and prints
/// the default scatter plus per-teacher summaries as JSON, with no filters
/// applied.

use mapscope::{
    recompute, DatasetLoader, ExplorerConfig, FilterPredicateSet, Query, SortOrder, Subject, SummaryMetric,
};
use std::process::ExitCode;

fn run() -> mapscope::Result<()> {
    let config = ExplorerConfig::from_env();
    config.validate()?;

    let loader = DatasetLoader::new(config);
    let table = loader.load()?;
    let predicates = FilterPredicateSet::new();

    let mut queries: Vec<Query> = Query::default_for(table.schema()).into_iter().collect();
    queries.extend([Subject::Mathematics, Subject::Reading].map(|subject| Query::TeacherSummary {
        subject,
        window: None,
        sort_by: SummaryMetric::MetGoalRate,
        order: SortOrder::Descending,
    }));

    for query in &queries {
        match recompute(&table, &predicates, query, loader.config()) {
            Ok(output) => println!("{}", output.to_json()?),
            Err(err) => log::warn!("skipping {}: {}", query.kind(), err),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
