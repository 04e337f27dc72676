use colored::Colorize;
use cpq_agent_core::salesforce::{
    build_login_envelope, format_field, login_url, parse_login_response, query_url,
    transform_query_response, QueryOutput, QueryResponse, SalesforceCredentials,
    SalesforceSession,
};

use crate::prelude::{println, *};

/// Salesforce module app - root command
#[derive(Debug, clap::Parser)]
#[command(name = "sf")]
#[command(about = "Salesforce connection checks and SOQL queries")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Log in with the configured credentials and print the session details
    #[clap(name = "login")]
    Login(LoginOptions),

    /// Run a SOQL query
    #[clap(name = "query")]
    Query(QueryOptions),
}

#[derive(Debug, clap::Args)]
pub struct LoginOptions {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct QueryOptions {
    /// SOQL statement, e.g. "SELECT Id, Name FROM SBQQ__Quote__c LIMIT 10"
    pub soql: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log in through the SOAP API.
pub async fn login(credentials: &SalesforceCredentials) -> Result<SalesforceSession> {
    let url = login_url(&credentials.domain);
    log::debug!("Salesforce login as {} via {}", credentials.username, url);

    let response = reqwest::Client::new()
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=UTF-8")
        .header("SOAPAction", "login")
        .body(build_login_envelope(credentials))
        .send()
        .await
        .map_err(|e| eyre!("Failed to send login request to Salesforce: {}", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| eyre!("Failed to read Salesforce login response: {}", e))?;

    // Login faults come back as HTTP 500 with a SOAP fault body.
    parse_login_response(&body)
        .map_err(|e| eyre!("{} [{}]", e, status))
}

/// Run a SOQL query with an existing session.
pub async fn query(session: &SalesforceSession, soql: &str) -> Result<QueryOutput> {
    let url = query_url(&session.instance_url, soql);
    log::debug!("Salesforce query: {}", soql);

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(&session.session_id)
        .send()
        .await
        .map_err(|e| eyre!("Failed to send query to Salesforce: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(eyre!("Salesforce query failed [{}]: {}", status, body));
    }

    let raw: QueryResponse = response
        .json()
        .await
        .map_err(|e| eyre!("Failed to parse Salesforce query response: {}", e))?;

    Ok(transform_query_response(raw))
}

/// Environment handed to executed code so it can reach the org.
pub fn session_env(
    credentials: &SalesforceCredentials,
    session: &SalesforceSession,
) -> Vec<(String, String)> {
    vec![
        ("SF_INSTANCE_URL".to_string(), session.instance_url.clone()),
        ("SF_SESSION_ID".to_string(), session.session_id.clone()),
        ("SF_USERNAME".to_string(), credentials.username.clone()),
        ("SF_PASSWORD".to_string(), credentials.password.clone()),
        (
            "SF_SECURITY_TOKEN".to_string(),
            credentials.security_token.clone(),
        ),
        ("SF_DOMAIN".to_string(), credentials.domain.clone()),
    ]
}

/// Module entry point
pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let secrets = crate::config::load(&global)?;
    let credentials = secrets.salesforce()?;

    let spinner = new_spinner("Logging in to Salesforce...");
    let session = login(credentials).await;
    let session = match session {
        Ok(session) => session,
        Err(err) => {
            spinner.finish_and_clear();
            return Err(err);
        }
    };

    match app.command {
        Commands::Login(options) => {
            spinner.finish_and_clear();
            display_session(&session, credentials, options.json)
        }
        Commands::Query(options) => {
            set_spinner_msg(Some(&spinner), "Running query...");
            let output = query(&session, &options.soql).await;
            spinner.finish_and_clear();
            display_query(&output?, options.json)
        }
    }
}

fn display_session(
    session: &SalesforceSession,
    credentials: &SalesforceCredentials,
    json: bool,
) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "username": credentials.username,
            "instance_url": session.instance_url,
            "server_url": session.server_url,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Username".bold().cyan(),
        credentials.username.bright_white()
    ]);
    table.add_row(prettytable::row![
        "Instance".bold().cyan(),
        session.instance_url.green()
    ]);
    table.add_row(prettytable::row![
        "Server URL".bold().cyan(),
        session.server_url.bright_black()
    ]);
    table.printstd();

    Ok(())
}

fn display_query(output: &QueryOutput, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(output)
            .map_err(|e| eyre!("Failed to serialize output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!(
        "\nFound {} record(s){}:\n",
        output.total_size.to_string().bold(),
        if output.done { "" } else { " (more available)" }
    );

    if output.records.is_empty() {
        return Ok(());
    }

    let mut table = new_table();
    table.set_titles(prettytable::Row::new(
        output
            .columns
            .iter()
            .map(|c| prettytable::Cell::new(&c.bold().cyan().to_string()))
            .collect(),
    ));

    for record in &output.records {
        table.add_row(prettytable::Row::new(
            output
                .columns
                .iter()
                .map(|c| {
                    let value = record
                        .get(c)
                        .map(format_field)
                        .unwrap_or_default();
                    prettytable::Cell::new(&value)
                })
                .collect(),
        ));
    }

    table.printstd();

    Ok(())
}
