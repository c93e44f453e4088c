use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::PathBuf;

use recipe_api::auth::hash_password;
use recipe_api::config::Config;
use recipe_api::models::NewUser;
use recipe_api::storage::Storage;

const TOKEN_FILE: &str = ".recipe_token";

#[derive(Parser)]
#[command(name = "recipe-cli")]
#[command(about = "CLI for the recipe API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Me,
    UpdateMe {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    ListRecipes {
        /// Comma-separated tag ids
        #[arg(long)]
        tags: Option<String>,
        /// Comma-separated ingredient ids
        #[arg(long)]
        ingredients: Option<String>,
    },
    GetRecipe {
        id: u64,
    },
    CreateRecipe {
        #[arg(short, long)]
        title: String,
        #[arg(short = 'm', long)]
        time_minutes: i32,
        #[arg(short, long)]
        price: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        link: String,
        /// Tag name; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Ingredient name; repeat for several
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,
    },
    DeleteRecipe {
        id: u64,
    },
    UploadImage {
        id: u64,
        #[arg(short, long)]
        file: PathBuf,
    },
    ListTags {
        #[arg(short, long)]
        assigned_only: bool,
    },
    ListIngredients {
        #[arg(short, long)]
        assigned_only: bool,
    },
    /// Create a staff superuser directly in the local store
    CreateSuperuser {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Delete a user and everything they own from the local store
    DeleteUser {
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

fn authorized(request: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    request.header("Authorization", format!("Bearer {}", token.trim()))
}

async fn print_response(request: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = request.send().await?;
    let status = res.status();
    println!("Response ({}): {}", status, res.text().await?);
    Ok(())
}

fn names(names: Vec<String>) -> Value {
    Value::Array(names.into_iter().map(|name| json!({ "name": name })).collect())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Register { email, password, name } => {
            let req = client
                .post(format!("{}/users/", url))
                .json(&json!({ "email": email, "password": password, "name": name }));
            print_response(req).await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{}/users/token/", url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: TokenResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in. Token saved to {}", TOKEN_FILE);
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
        Commands::Me => {
            print_response(authorized(client.get(format!("{}/users/me/", url)))).await?;
        }
        Commands::UpdateMe { name, password } => {
            let mut body = Map::new();
            if let Some(name) = name {
                body.insert("name".to_string(), json!(name));
            }
            if let Some(password) = password {
                body.insert("password".to_string(), json!(password));
            }
            let req = authorized(client.patch(format!("{}/users/me/", url))).json(&body);
            print_response(req).await?;
        }
        Commands::ListRecipes { tags, ingredients } => {
            let mut query = Vec::new();
            if let Some(tags) = tags {
                query.push(("tags", tags));
            }
            if let Some(ingredients) = ingredients {
                query.push(("ingredients", ingredients));
            }
            let req = authorized(client.get(format!("{}/recipes/", url))).query(&query);
            print_response(req).await?;
        }
        Commands::GetRecipe { id } => {
            print_response(authorized(client.get(format!("{}/recipes/{}/", url, id)))).await?;
        }
        Commands::CreateRecipe { title, time_minutes, price, description, link, tags, ingredients } => {
            let req = authorized(client.post(format!("{}/recipes/", url))).json(&json!({
                "title": title,
                "time_minutes": time_minutes,
                "price": price,
                "description": description,
                "link": link,
                "tags": names(tags),
                "ingredients": names(ingredients),
            }));
            print_response(req).await?;
        }
        Commands::DeleteRecipe { id } => {
            print_response(authorized(client.delete(format!("{}/recipes/{}/", url, id)))).await?;
        }
        Commands::UploadImage { id, file } => {
            let bytes = fs::read(&file)?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image")
                .to_string();
            let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));
            let req = authorized(client.post(format!("{}/recipes/{}/upload-image/", url, id))).multipart(form);
            print_response(req).await?;
        }
        Commands::ListTags { assigned_only } => {
            let req = authorized(client.get(format!("{}/tags/", url)))
                .query(&[("assigned_only", u8::from(assigned_only))]);
            print_response(req).await?;
        }
        Commands::ListIngredients { assigned_only } => {
            let req = authorized(client.get(format!("{}/ingredients/", url)))
                .query(&[("assigned_only", u8::from(assigned_only))]);
            print_response(req).await?;
        }
        Commands::CreateSuperuser { email, password, name } => {
            let config = Config::load()?;
            if password.chars().count() < config.min_password_len {
                return Err(format!("password must have at least {} characters", config.min_password_len).into());
            }
            let storage = Storage::open(&config.db_path)?;
            let user = storage.create_user(NewUser {
                email,
                name,
                password_hash: hash_password(&password, config.bcrypt_cost)?,
                is_staff: true,
                is_superuser: true,
            })?;
            storage.flush().await?;
            println!("Superuser {} created (id {}).", user.email, user.id);
        }
        Commands::DeleteUser { email } => {
            let config = Config::load()?;
            let storage = Storage::open(&config.db_path)?;
            match storage.find_user_by_email(&email)? {
                Some(user) => {
                    storage.delete_user(user.id)?;
                    storage.flush().await?;
                    println!("User {} and everything they owned deleted.", user.email);
                }
                None => println!("No user with email {}.", email),
            }
        }
    }

    Ok(())
}
