use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "resilience-cli")]
#[command(about = "Command-line client for the travel resilience core", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dependency health, breakers and cache statistics
    Health,
    /// Generate an itinerary
    Itinerary {
        destination: String,
        #[arg(short, long, default_value_t = 3)]
        days: u32,
        #[arg(short, long)]
        interest: Vec<String>,
    },
    /// Search flights
    Flights {
        origin: String,
        destination: String,
        /// Departure date (YYYY-MM-DD)
        departure: String,
        /// Return date (YYYY-MM-DD)
        #[arg(short, long)]
        r#return: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        passengers: u32,
    },
    /// Search hotels
    Hotels {
        city: String,
        /// Check-in date (YYYY-MM-DD)
        check_in: String,
        /// Check-out date (YYYY-MM-DD)
        check_out: String,
        #[arg(short, long, default_value_t = 1)]
        guests: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Itinerary {
            destination,
            days,
            interest,
        } => {
            let body = json!({ "destination": destination, "days": days, "interests": interest });
            client.post(format!("{base}/v1/itinerary")).json(&body).send().await?
        }
        Commands::Flights {
            origin,
            destination,
            departure,
            r#return,
            passengers,
        } => {
            let body = json!({
                "origin": origin,
                "destination": destination,
                "departure_date": departure,
                "return_date": r#return,
                "passengers": passengers,
            });
            client.post(format!("{base}/v1/flights/search")).json(&body).send().await?
        }
        Commands::Hotels {
            city,
            check_in,
            check_out,
            guests,
        } => {
            let body = json!({ "city": city, "check_in": check_in, "check_out": check_out, "guests": guests });
            client.post(format!("{base}/v1/hotels/search")).json(&body).send().await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let pretty = serde_json::to_string_pretty(&json)?;
            if status.is_success() {
                println!("{pretty}");
            } else {
                eprintln!("Error: API returned status {status}");
                eprintln!("{pretty}");
            }
        }
        Err(_) => {
            eprintln!("Error: API returned status {status}");
            eprintln!("Response: {text}");
        }
    }
    Ok(())
}
