//! Load data script for the recipe API
//!
//! Populates the Sled store with a demo account plus a handful of recipes,
//! tags and ingredients, so the API has something to show right away.
//! Run: cargo run --bin load_data
//! Log in afterwards with demo@example.com / demopass123.
//! Running it again is a no-op once the demo account exists.

use recipe_api::auth::hash_password;
use recipe_api::config::Config;
use recipe_api::filters::RecipeFilter;
use recipe_api::models::{LabelKind, NewRecipe, NewUser};
use recipe_api::price::Price;
use recipe_api::storage::Storage;
use recipe_api::telemetry;
use tracing::info;

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demopass123";

struct Sample {
    title: &'static str,
    minutes: i32,
    price: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    ingredients: &'static [&'static str],
}

const SAMPLES: &[Sample] = &[
    Sample {
        title: "Thai vegetable curry",
        minutes: 35,
        price: "8.50",
        description: "Coconut milk curry with whatever vegetables are in the fridge.",
        tags: &["Vegan", "Dinner"],
        ingredients: &["Coconut milk", "Red curry paste", "Rice"],
    },
    Sample {
        title: "Chow mein",
        minutes: 20,
        price: "6.25",
        description: "Quick stir-fried noodles.",
        tags: &["Chinese", "Dinner"],
        ingredients: &["Egg noodles", "Soy sauce", "Spring onion"],
    },
    Sample {
        title: "Porridge",
        minutes: 10,
        price: "1.20",
        description: "Oats simmered in milk.",
        tags: &["Breakfast", "Vegetarian"],
        ingredients: &["Oats", "Milk"],
    },
    Sample {
        title: "Aubergine with tahini",
        minutes: 45,
        price: "5.75",
        description: "Roasted aubergine, tahini dressing, pomegranate.",
        tags: &["Vegetarian"],
        ingredients: &["Aubergine", "Tahini"],
    },
];

fn owned(names: &[&str]) -> Option<Vec<String>> {
    Some(names.iter().map(|name| name.to_string()).collect())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let _log_guard = telemetry::init(&config.log)?;

    let storage = Storage::open(&config.db_path)?;

    if let Some(existing) = storage.find_user_by_email(DEMO_EMAIL)? {
        info!(user_id = existing.id, "demo account already present, nothing to load");
        return Ok(());
    }

    let user = storage.create_user(NewUser {
        email: DEMO_EMAIL.to_string(),
        name: "Demo Cook".to_string(),
        password_hash: hash_password(DEMO_PASSWORD, config.bcrypt_cost)?,
        ..NewUser::default()
    })?;

    // An unused tag, so assigned_only has something to filter out.
    storage.create_label(LabelKind::Tag, user.id, "Dessert")?;

    for sample in SAMPLES {
        let recipe = storage.create_recipe(
            user.id,
            NewRecipe {
                title: sample.title.to_string(),
                description: sample.description.to_string(),
                time_minutes: sample.minutes,
                price: sample.price.parse::<Price>()?,
                link: String::new(),
                tags: owned(sample.tags),
                ingredients: owned(sample.ingredients),
            },
        )?;
        info!(recipe_id = recipe.id, title = %recipe.title, "recipe loaded");
    }

    storage.flush().await?;

    let recipes = storage.list_recipes(user.id, &RecipeFilter::default())?;
    let tags = storage.list_labels(LabelKind::Tag, user.id, false)?;
    let ingredients = storage.list_labels(LabelKind::Ingredient, user.id, false)?;
    println!(
        "✅ Loaded {} recipes, {} tags and {} ingredients for {} (password: {})",
        recipes.len(),
        tags.len(),
        ingredients.len(),
        DEMO_EMAIL,
        DEMO_PASSWORD
    );

    Ok(())
}
