use clap::{Parser, ValueEnum};
use reqwest::Client;
use serde_json::{Value, json};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Endpoint {
    PlanAula,
    PlanMejoramiento,
    Cards,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of a running server, e.g. http://localhost:1111
    base_url: String,

    /// Endpoint to exercise.
    #[arg(long, value_enum, default_value = "plan-aula")]
    endpoint: Endpoint,

    /// Only read, do not submit the sample payload.
    #[arg(long)]
    read_only: bool,
}

fn sample(endpoint: Endpoint) -> Value {
    match endpoint {
        Endpoint::PlanAula => json!({
            "values": [
                "Matemáticas", "Docente de prueba", "7", "Fracciones", "1",
                "Comprende fracciones", "Taller", "Guía", "Quiz", "2025-06-01"
            ]
        }),
        Endpoint::PlanMejoramiento => json!({
            "grupo": "701",
            "asignatura": "Matemáticas",
            "docenteSeleccionado": "Docente de prueba",
            "fechaLimite": "2025-06-01",
            "planMejoramiento": "Taller de refuerzo",
            "nombresEstudiante": ["Estudiante Uno", "Estudiante Dos"]
        }),
        Endpoint::Cards => json!([{ "card": "A1", "teachers": "Docente de prueba" }]),
    }
}

fn path(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::PlanAula => "plan-aula",
        Endpoint::PlanMejoramiento => "plan-mejoramiento",
        Endpoint::Cards => "cards",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let url = format!("{}/{}", args.base_url.trim_end_matches('/'), path(args.endpoint));

    if !args.read_only {
        let response = client.post(&url).json(&sample(args.endpoint)).send().await?;
        println!("POST {url}: {}", response.status());
        println!("{}\n", response.text().await?);
    }

    let response = client.get(&url).send().await?;
    println!("GET {url}: {}", response.status());

    let body: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}
