use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use gdxgraph::axes::DrawCommand;
use gdxgraph::csv_reader::read_csv_file;
use gdxgraph::{
    describe_container, graph_scenarios_two_variables, render_figure, stacked_bar_graph, verify,
    Baseline, ChartConfig, ChartError, ChartKind, ChartStyles, Color, ComparisonRequest, Figure,
    MemoryContainer, RenderOptions, Scenario, Selection, SeriesOptions, StackedBarOptions,
    StyleMap,
};

/// Helper function to run the gdxgraph binary
fn run_gdxgraph(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gdxgraph"))
        .args(args)
        .output()
        .expect("Failed to run gdxgraph")
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn scenarios() -> Vec<Scenario> {
    ["Reference", "High", "Low"]
        .iter()
        .map(|label| {
            let path = format!("test/{}.csv", label.to_lowercase());
            Scenario::new(*label, read_csv_file(Path::new(&path)).unwrap())
        })
        .collect()
}

fn labels() -> HashMap<String, String> {
    [("coal", "Coal"), ("gas", "Natural gas"), ("wind", "Wind")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_stacked_bar_end_to_end() {
    let scenarios = scenarios();
    let request = ComparisonRequest::new(
        "year",
        "tech",
        ["2020", "2030", "2040", "2050"],
        ["coal", "gas", "wind"],
    )
    .narrowed_to("region", "QC");
    let colors = StyleMap::new("color")
        .with(["coal"], Color::BLACK)
        .with(["gas"], Color::rgb(255, 127, 14))
        .with(["wind"], Color::rgb(44, 160, 44));
    let options = StackedBarOptions {
        baseline: Some(Baseline { scenario: "Reference".into(), axis_value: "2020".into() }),
        ..StackedBarOptions::default()
    };

    let mut fig = Figure::new();
    let wide = stacked_bar_graph(&mut fig, &scenarios, &request, &labels(), &colors, &options)
        .unwrap();

    // One baseline bar, then three bars for each later year
    assert_eq!(wide.row_count(), 10);
    assert_eq!(wide.rows[0].scenario.as_deref(), Some("Reference"));
    assert_eq!(wide.rows[1].axis, "2030");

    let separators = fig
        .commands()
        .iter()
        .filter(|c| matches!(c, DrawCommand::Connector { .. }))
        .count();
    assert_eq!(separators, 3);

    let bytes = render_figure(&fig, &RenderOptions::default()).unwrap();
    assert!(is_valid_png(&bytes));
}

#[test]
fn test_wide_table_total_matches_filtered_input() {
    let scenarios = scenarios();
    let request = ComparisonRequest::new("year", "tech", ["2030", "2050"], ["wind"])
        .narrowed_to("region", "ON");
    let colors = StyleMap::new("color")
        .with(["wind", "Reference"], Color::BLACK)
        .with(["wind", "High"], Color::BLACK)
        .with(["wind", "Low"], Color::BLACK);
    let options = SeriesOptions::new(ChartKind::Bar, ChartStyles::new(colors));

    let mut fig = Figure::new();
    let wide =
        graph_scenarios_two_variables(&mut fig, &scenarios, &request, &labels(), &options).unwrap();

    let expected: f64 = scenarios
        .iter()
        .flat_map(|s| s.table.rows.iter())
        .filter(|r| (r[0] == "2030" || r[0] == "2050") && r[1] == "wind" && r[2] == "ON")
        .map(|r| r[3].parse::<f64>().unwrap())
        .sum();
    assert!((wide.total() - expected).abs() < 1e-9);
    assert_eq!(wide.row_count(), 2);
}

#[test]
fn test_missing_style_key_leaves_figure_empty() {
    let scenarios = scenarios();
    let request = ComparisonRequest::new("year", "tech", ["2030"], ["coal", "gas"]);
    let colors = StyleMap::new("color").with(["coal"], Color::BLACK);

    let mut fig = Figure::new();
    let err = stacked_bar_graph(
        &mut fig,
        &scenarios,
        &request.narrowed_to("region", "QC"),
        &labels(),
        &colors,
        &StackedBarOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ChartError>(),
        Some(&ChartError::StyleKeyMissing { map: "color", key: "gas".into() })
    );
    assert!(fig.commands().is_empty());
}

#[test]
fn test_chart_description_from_file() {
    let config = ChartConfig::load(Path::new("test/lines.json")).unwrap();
    let scenarios = config.load_scenarios().unwrap();
    let mut fig = Figure::new();
    let wide = config.draw(&mut fig, &scenarios).unwrap();

    assert_eq!(wide.columns.len(), 4);
    assert_eq!(fig.scatters().count(), 4);
    let legend: Vec<String> = fig
        .current_legend()
        .unwrap()
        .entries
        .iter()
        .map(|e| e.label.clone())
        .collect();
    assert_eq!(
        legend,
        vec![
            "Wind Ontario High",
            "Wind Ontario Reference",
            "Wind Quebec High",
            "Wind Quebec Reference",
        ]
    );
}

#[test]
fn test_verify_and_describe_library() {
    let current = MemoryContainer::load(Path::new("test/container.json")).unwrap();
    let old = MemoryContainer::load(Path::new("test/container_old.json")).unwrap();
    let selection = Selection {
        name: "generation".into(),
        x_var: "year".into(),
        y_var: "tech".into(),
        years: vec!["2020".into()],
        data: vec!["coal".into()],
        z: None,
    };

    let tables = verify(&[current.clone()], &selection).unwrap();
    assert_eq!(tables[0].len(), 4);
    // A source without the axis column fails and yields no tables
    assert!(verify(&[current.clone(), old], &selection).is_err());

    let (tables, names) = describe_container(&current);
    assert_eq!(tables.len(), 5);
    assert_eq!(names["capacity"], "installed capacity (GW)");
}

#[test]
fn test_cli_plot_png_to_file() {
    let out = std::env::temp_dir().join(format!("gdxgraph-stacked-{}.png", std::process::id()));
    let output = run_gdxgraph(&[
        "plot",
        "--config",
        "test/stacked.json",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Failed: {}", String::from_utf8_lossy(&output.stderr));
    let bytes = fs::read(&out).unwrap();
    assert!(is_valid_png(&bytes), "Output is not a valid PNG");
    let _ = fs::remove_file(&out);
}

#[test]
fn test_cli_plot_svg_to_stdout() {
    let output = run_gdxgraph(&["plot", "--config", "test/lines.json"]);
    assert!(output.status.success(), "Failed: {}", String::from_utf8_lossy(&output.stderr));
    let svg = String::from_utf8_lossy(&output.stdout);
    assert!(svg.starts_with("<svg"));
}

#[test]
fn test_cli_verify() {
    let output = run_gdxgraph(&[
        "verify",
        "--container",
        "test/container.json",
        "--name",
        "generation",
        "--x-var",
        "year",
        "--y-var",
        "tech",
        "--years",
        "2020",
        "2030",
        "--data",
        "coal",
        "wind",
        "--z-var",
        "region",
        "--z-values",
        "QC",
    ]);
    assert!(output.status.success(), "Failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("4 records"));
}

#[test]
fn test_cli_verify_reports_missing_value() {
    let output = run_gdxgraph(&[
        "verify",
        "--container",
        "test/container.json",
        "--name",
        "generation",
        "--x-var",
        "year",
        "--y-var",
        "tech",
        "--years",
        "2020",
        "--data",
        "solar",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'solar' can't be found"));
    assert!(stderr.contains("coal, wind"));
}

#[test]
fn test_cli_describe() {
    let output = run_gdxgraph(&["describe", "--container", "test/container.json"]);
    assert!(output.status.success(), "Failed: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# aliases\nname,alias_with\ntt,t\n"));
    assert!(stdout.contains("generation,electricity generation (TWh),3,\"year,tech,region\",4"));
    assert!(stdout.contains("balance: supply meets demand"));
}

#[test]
fn test_cli_missing_config() {
    let output = run_gdxgraph(&["plot", "--config", "test/nonexistent.json"]);
    assert!(!output.status.success());
}
