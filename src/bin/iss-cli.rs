use clap::Parser;
use iss_tracker::geo::DistanceReport;

#[derive(Parser)]
#[command(name = "iss-cli")]
#[command(about = "Ask the gateway how far the ISS is from a place", long_about = None)]
struct Cli {
    /// Gateway base URL
    #[arg(short, long, env = "GATEWAY_URL")]
    url: String,

    /// Place name, e.g. "London"
    location: String,

    /// Print the raw JSON answer
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client
        .get(&cli.url)
        .query(&[("location", cli.location.as_str())])
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error ({}): {}", status.as_u16(), text);
        std::process::exit(1);
    }

    if cli.json {
        let json: serde_json::Value = serde_json::from_str(&text)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let report: DistanceReport = serde_json::from_str(&text)?;
    println!("Location:     {}", cli.location);
    println!(
        "ISS position: latitude {}, longitude {}",
        report.satellite_location.latitude, report.satellite_location.longitude
    );
    println!("Distance:     {} km", report.distance_km);
    Ok(())
}
