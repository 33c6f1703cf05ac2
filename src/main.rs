use anyhow::{Context, Result};
use batch::{BatchStatus, JobExecution};
use clap::{Parser, Subcommand};
use etl_workflow::{run_etl, EtlConfig};
use log::info;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Nombres con los que se generan las filas de ejemplo.
const NAMES: [&str; 9] = ["josh", "jane", "bob", "patrick", "jennifer", "tammy", "lois", "george", "jimmy"];

#[derive(Parser)]
#[command(name = "batch-demo")]
#[command(version = "0.1.0")]
#[command(about = "Job ETL por chunks: CSV -> tabla people -> recuento por edad")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ejecuta el job `etl`
    Run {
        /// Fichero de entrada `name,age,email`
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Fichero de salida `age,count`
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[arg(short = 'c', long, value_name = "N")]
        chunk_size: Option<usize>,

        /// URL de la base de datos SQLite (por defecto, en memoria)
        #[arg(short = 'd', long, value_name = "URL")]
        database_url: Option<String>,

        #[arg(long, value_name = "MS")]
        listener_timeout_ms: Option<u64>,

        /// Imprime la ejecución completa en JSON
        #[arg(long)]
        json: bool,

        /// Pares `clave=valor` adicionales (input, output, chunk.size, ...)
        #[arg(value_name = "KEY=VALUE")]
        pairs: Vec<String>,
    },
    /// Genera un fichero de entrada aleatorio
    Generate {
        #[arg(short = 'n', long, default_value_t = 100)]
        count: usize,

        /// Destino; sin él se escribe en stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Run { input, output, chunk_size, database_url, listener_timeout_ms, json, pairs } => {
            let mut config = EtlConfig::from_env()?;
            if let Some(input) = input {
                config.input = input;
            }
            if let Some(output) = output {
                config.output = output;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(url) = database_url {
                config.database_url = Some(url);
            }
            if let Some(ms) = listener_timeout_ms {
                config.listener_timeout_ms = ms;
            }
            config.apply_pairs(&pairs)?;

            let execution = run_etl(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&execution)?);
            } else {
                print_summary(&execution);
            }
            Ok(if execution.status == BatchStatus::Completed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Generate { count, output } => {
            let lines = generate_lines(count, &mut rand::rng());
            match output {
                Some(path) => {
                    write_lines(&path, &lines)?;
                    info!("{} filas escritas en {}", lines.len(), path.display());
                }
                None => {
                    let mut out = io::stdout().lock();
                    for line in &lines {
                        writeln!(out, "{}", line)?;
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(execution: &JobExecution) {
    println!("job '{}' ejecución {}: {} ({})",
             execution.job_name, execution.id, execution.status, execution.exit_status.code);
    if let Some(message) = execution.failure_message() {
        println!("  {}", message);
    }
    for step in &execution.step_executions {
        println!("  {:<10} {:<9} leídos={} escritos={} filtrados={} commits={} rollbacks={}",
                 step.step_name,
                 step.status.as_str(),
                 step.read_count,
                 step.write_count,
                 step.filter_count,
                 step.commit_count,
                 step.rollback_count);
    }
}

/// Filas `name,age,email` con nombre del conjunto fijo y edad en 0..100.
fn generate_lines<R: Rng>(count: usize, rng: &mut R) -> Vec<String> {
    (0..count).map(|_| {
                  let name = NAMES.choose(rng).copied().unwrap_or(NAMES[0]);
                  format!("{},{},{}@email.com", name, rng.random_range(0..100), name)
              })
              .collect()
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creando {}", parent.display()))?;
    }
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("escribiendo {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_lines_follow_the_input_format() {
        let lines = generate_lines(50, &mut rand::rng());
        assert_eq!(lines.len(), 50);
        for line in &lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 3);
            assert!(NAMES.contains(&fields[0]));
            let age: i32 = fields[1].parse().unwrap();
            assert!((0..100).contains(&age));
            assert_eq!(fields[2], format!("{}@email.com", fields[0]));
        }
    }

    #[test]
    fn generated_file_runs_through_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data").join("in.csv");
        write_lines(&input, &generate_lines(30, &mut rand::rng())).unwrap();

        let config = EtlConfig { input, output: dir.path().join("out.csv"), chunk_size: 7, ..EtlConfig::default() };
        let execution = run_etl(&config).unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);
        let total: i64 = fs::read_to_string(&config.output).unwrap()
                                                           .lines()
                                                           .map(|l| l.split(',').nth(1).unwrap().parse::<i64>().unwrap())
                                                           .sum();
        assert_eq!(total, 30);
    }
}
