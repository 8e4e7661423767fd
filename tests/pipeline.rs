use mortality_pivot::charts::{Chart, ChartCollector, SvgChartRenderer};
use mortality_pivot::config::Config;
use mortality_pivot::store::{ContainerStore, COVID_DEATH_RATE, DEATH_DATA, GROUPS};
use mortality_pivot::{ErrorKind, Pipeline};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HISTORICAL: &str = "\
Jurisdiction of Occurrence,Week Ending Date,All  Cause
Ohio,2018-01-06,2500
New York,2018-01-06,1000
New York City,2018-01-06,1100
California,2018-01-06,5000
United States,2018-01-06,9600
";

const RECENT: &str = "\
Jurisdiction of Occurrence,Week Ending Date,All Cause,\"COVID-19 (U071, Multiple Cause of Death)\"
Ohio,04/04/2020,2700,120
New York,04/04/2020,1800,\"1,200\"
New York City,04/04/2020,4000,2500
California,04/04/2020,5500,
United States,04/04/2020,14000,3820
";

const POPULATION: &str = "\
location,population
Ohio,11689100
New York,19453561
California,39512223
";

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn config_in(dir: &Path, historical: &str, recent: &str, population: &str) -> Config {
    let mut config = Config::default();
    config.sources.historical.path = write(dir, "historical.csv", historical);
    config.sources.recent.path = write(dir, "recent.csv", recent);
    config.population.path = write(dir, "population.csv", population);
    config.output.container = dir.join("death_data.zip");
    config.charts.directory = dir.join("charts");
    config
}

#[test]
fn test_full_run_persists_every_group() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path(), HISTORICAL, RECENT, POPULATION);

    let mut sink = ChartCollector::default();
    let (analysis, container) = Pipeline::new(&config).run(Some(&mut sink)).unwrap();

    assert_eq!(analysis.table.len(), 10);
    assert_eq!(sink.charts.len(), 7);

    // Blank COVID cell is zero; non-COVID is the exact difference.
    let california = analysis
        .table
        .rows()
        .iter()
        .find(|o| o.location == "California" && o.death_total == 5500)
        .unwrap();
    assert_eq!(california.death_covid, 0);
    assert_eq!(california.death_non_covid, 5500);

    let summary = &analysis.consolidated_summary;
    assert_eq!(summary.rows[0].location, "New York");
    assert_eq!(summary.rows[0].deaths, 3700);
    assert!(summary.rows.iter().all(|r| r.location != "United States"));

    assert_eq!(ContainerStore::groups(&container).unwrap(), GROUPS.to_vec());
    let death_data = ContainerStore::read_table(&container, DEATH_DATA).unwrap();
    assert_eq!(death_data.height(), 10);
    let rates = ContainerStore::read_table(&container, COVID_DEATH_RATE).unwrap();
    assert_eq!(rates.height(), 3);
}

#[test]
fn test_existing_container_needs_overwrite() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path(), HISTORICAL, RECENT, POPULATION);

    Pipeline::new(&config).run(None).unwrap();
    let err = Pipeline::new(&config).run(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    config.output.overwrite = true;
    assert!(Pipeline::new(&config).run(None).is_ok());
}

#[test]
fn test_missing_population_is_a_data_error() {
    let dir = TempDir::new().unwrap();
    let population = "location,population\nOhio,11689100\n";
    let config = config_in(dir.path(), HISTORICAL, RECENT, population);

    let err = Pipeline::new(&config).run(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataFormat);
    assert!(!config.output.container.exists());
}

#[test]
fn test_missing_source_file() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path(), HISTORICAL, RECENT, POPULATION);
    config.sources.recent.path = dir.path().join("nowhere.csv");

    let err = Pipeline::new(&config).run(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn test_header_only_sources_give_empty_tables() {
    let dir = TempDir::new().unwrap();
    let historical = HISTORICAL.lines().next().unwrap().to_string() + "\n";
    let recent = RECENT.lines().next().unwrap().to_string() + "\n";
    let config = config_in(dir.path(), &historical, &recent, POPULATION);

    let (analysis, container) = Pipeline::new(&config).run(None).unwrap();
    assert!(analysis.table.is_empty());
    assert!(analysis.consolidated_summary.rows.is_empty());
    assert!(analysis.death_rates.rows.is_empty());
    assert!(analysis.weekly_average.ranked.is_empty());

    let death_data = ContainerStore::read_table(&container, DEATH_DATA).unwrap();
    assert_eq!(death_data.height(), 0);
}

#[test]
fn test_zero_covid_run_still_charts_and_persists() {
    let dir = TempDir::new().unwrap();
    let historical = "\
Jurisdiction of Occurrence,Week Ending Date,All  Cause
Ohio,2018-01-06,2500
Utah,2018-01-06,400
";
    let recent = RECENT.lines().next().unwrap().to_string() + "\n";
    let population = "location,population\nOhio,11689100\nUtah,3205958\n";
    let config = config_in(dir.path(), historical, &recent, population);

    let mut sink = ChartCollector::default();
    let (analysis, container) = Pipeline::new(&config).run(Some(&mut sink)).unwrap();

    assert_eq!(analysis.consolidated_summary.total, 0);
    assert!(!analysis.consolidated_summary.rows.is_empty());
    let distribution = sink
        .charts
        .iter()
        .find_map(|chart| match chart {
            Chart::Bar(bars) if bars.title == "COVID Death Distribution" => Some(bars),
            _ => None,
        })
        .unwrap();
    assert!(distribution
        .bars
        .iter()
        .all(|bar| bar.annotation == "0.0000%\n(0)"));

    assert!(container.is_file());
    assert_eq!(ContainerStore::groups(&container).unwrap(), GROUPS.to_vec());
}

#[test]
fn test_svg_charts_are_written() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path(), HISTORICAL, RECENT, POPULATION);

    let charts = &config.charts;
    let mut renderer =
        SvgChartRenderer::new(&charts.directory, charts.width, charts.height).unwrap();
    Pipeline::new(&config).run(Some(&mut renderer)).unwrap();

    assert!(!renderer.written().is_empty());
    for path in renderer.written() {
        assert_eq!(path.extension().unwrap(), "svg");
        assert!(path.is_file());
    }
}
