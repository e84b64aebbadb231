use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use cohort_output::RunSummary;

use crate::pipeline::RunOutcome;

pub fn print_summary(outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!("Output: {}", summary.output_root.display());
    println!("Cohort: {}", outcome.tables.stays.display());
    if let Some(path) = &outcome.phenotype_labels {
        println!("Phenotype labels: {}", path.display());
    }
    println!("Summary: {}", outcome.summary_path.display());
    println!("{}", stage_table(summary));
    println!("{}", diagnosis_table(summary));
    if !summary.partitions.is_empty() {
        println!("{}", partition_table(summary));
    }
}

pub fn stage_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Cohort stage"), header_cell("Rows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for stage in &summary.cohort_stages {
        table.add_row(vec![Cell::new(stage.stage), Cell::new(stage.rows)]);
    }
    table.add_row(vec![
        total_cell("Subjects"),
        Cell::new(summary.cohort_subjects).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn diagnosis_table(summary: &RunSummary) -> Table {
    let report = &summary.diagnoses;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Diagnoses"), header_cell("Rows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![
        Cell::new("no dictionary title"),
        count_cell(report.untitled_rows as u64, Color::Yellow),
    ]);
    table.add_row(vec![Cell::new("titled"), Cell::new(report.input_rows)]);
    table.add_row(vec![Cell::new("ICD-9"), Cell::new(report.icd9_rows)]);
    table.add_row(vec![Cell::new("ICD-10 mapped"), Cell::new(report.mapped_rows)]);
    table.add_row(vec![
        Cell::new("ICD-10 unmapped"),
        count_cell(report.unmapped_rows as u64, Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("distinct unmapped codes"),
        count_cell(report.unmapped_codes.len() as u64, Color::Yellow),
    ]);
    table.add_row(vec![Cell::new("normalized"), Cell::new(report.output_rows)]);
    table.add_row(vec![
        total_cell("In cohort"),
        Cell::new(summary.cohort_diagnoses).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn partition_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Read"),
        header_cell("Written"),
        header_cell("Subject filtered"),
        header_cell("Item filtered"),
        header_cell("Malformed"),
        header_cell("Subjects"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for stats in &summary.partitions {
        table.add_row(vec![
            Cell::new(&stats.source)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(stats.rows_read),
            Cell::new(stats.rows_written),
            dim_cell(stats.subject_filtered),
            dim_cell(stats.item_filtered),
            count_cell(stats.malformed_rows, Color::Yellow),
            Cell::new(stats.subjects_flushed),
        ]);
    }
    table.add_row(vec![
        total_cell("TOTAL"),
        dim_cell("-"),
        Cell::new(summary.events_written()).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn total_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: u64, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
