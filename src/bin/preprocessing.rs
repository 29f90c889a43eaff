use std::fs::{self, File};
use std::io::Cursor;
use std::path::PathBuf;

use arrecadacao_graph::config::Encoding;
use arrecadacao_graph::records::{decode, parse_amount};
use clap::Parser;
use polars::prelude::*;

/// Collapses the raw monthly revenue file into one row per (year, state).
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = "data/arrecadacao-estado.csv")]
    input: PathBuf,

    #[arg(long, default_value = "data/processed_arrecadacao.csv")]
    output: PathBuf,

    #[arg(long, default_value_t = ';')]
    delimiter: char,

    #[arg(long, value_enum, default_value = "latin1")]
    encoding: EncodingArg,

    #[arg(long)]
    decimal_comma: bool,

    #[arg(long, default_value = "Ano")]
    year_column: String,

    #[arg(long, default_value = "UF")]
    state_column: String,

    /// Columns dropped before aggregation
    #[arg(long, default_value = "Mês")]
    ignore: Vec<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EncodingArg {
    Utf8,
    Latin1,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => Encoding::Utf8,
            EncodingArg::Latin1 => Encoding::Latin1,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if !args.delimiter.is_ascii() {
        return Err(format!("delimiter '{}' is not a single byte", args.delimiter).into());
    }

    // polars only reads UTF-8, so transcode first.
    let raw = fs::read(&args.input)?;
    let text = decode(&raw, args.encoding.into());

    let mut df = CsvReader::new(Cursor::new(text.into_bytes()))
        .has_header(true)
        .with_separator(args.delimiter as u8)
        .infer_schema(Some(100))
        .finish()?;

    for name in &args.ignore {
        if df.get_column_names().contains(&name.as_str()) {
            df = df.drop(name)?;
        }
    }

    // Coerce the value columns to numbers, unparseable cells become null
    let value_columns: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| **name != args.year_column && **name != args.state_column)
        .map(|name| name.to_string())
        .collect();
    for name in &value_columns {
        let coerced = {
            let column = df.column(name)?;
            match column.dtype() {
                DataType::Utf8 => column
                    .utf8()?
                    .into_iter()
                    .map(|value| value.and_then(|v| parse_amount(v, args.decimal_comma)))
                    .collect::<Float64Chunked>()
                    .with_name(name)
                    .into_series(),
                _ => column.cast(&DataType::Float64)?,
            }
        };
        df.with_column(coerced)?;
    }

    // Group by year and state, summing every value column
    let sums: Vec<Expr> = value_columns.iter().map(|name| col(name).sum()).collect();
    let mut grouped = df
        .lazy()
        .group_by_stable([col(&args.year_column), col(&args.state_column)])
        .agg(sums)
        .collect()?;

    println!("{:?}", grouped.head(Some(5)));

    if let Some(parent) = args.output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&args.output)?;
    CsvWriter::new(&mut file).finish(&mut grouped)?;

    println!(
        "Wrote {} rows to {}",
        grouped.height(),
        args.output.display()
    );
    Ok(())
}
