use std::path::PathBuf;

use colored::Colorize;
use verdant::prelude::*;

use super::{into_result, CommandResult};

/// Input of `verdant plants add`, as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    pub image: Option<PathBuf>,
    pub email: String,
    pub display_name: Option<String>,
}

impl AddArgs {
    pub fn form(&self) -> PlantForm {
        PlantForm {
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            price: self.price.clone(),
            quantity: self.quantity.clone(),
        }
    }

    pub fn principal(&self) -> Principal {
        let principal = Principal::new(self.email.trim(), self.email.trim());
        match &self.display_name {
            Some(name) => principal.with_display_name(name),
            None => principal,
        }
    }
}

pub async fn list(market: &Marketplace) -> CommandResult {
    let mut plants = market.plants();
    let plants = into_result(plants.settled().await)?;

    if plants.is_empty() {
        println!("{}", "No plants listed".dimmed());
        return Ok(());
    }
    println!("{}", format!("{} plant(s)", plants.len()).bold());
    for plant in plants.iter() {
        println!("  {}", summary_line(plant));
    }
    Ok(())
}

pub async fn show(market: &Marketplace, id: &str) -> CommandResult {
    let mut plant = market.plant(id);
    let plant = into_result(plant.settled().await)?;
    for line in details(&plant) {
        println!("{line}");
    }
    Ok(())
}

pub async fn add(market: &Marketplace, args: AddArgs) -> CommandResult {
    let image = args.image.as_deref().map(ImageFile::from_path).transpose()?;
    market.identity().sign_in(args.principal(), market.config().api_token.clone());

    let mut form = args.form();
    match market.add_plant_flow().submit(&mut form, image).await {
        Ok(result) => {
            let id = result.id().unwrap_or("unknown");
            println!("{} {}", verdant::PLANT_ADDED.green(), format!("(id {id})").dimmed());
            Ok(())
        }
        Err(ClientError::Validation(errors)) => {
            for err in &errors {
                eprintln!("  {} {}", format!("{}:", err.field).yellow(), err.message);
            }
            Err(ClientError::Validation(errors).into())
        }
        Err(err) => Err(err.into()),
    }
}

/// `Name [Category] $price x quantity (id)`
pub fn summary_line(plant: &Plant) -> String {
    let category = plant
        .category
        .as_deref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default();
    format!(
        "{}{} ${:.2} x {} ({})",
        plant.name.bold(),
        category,
        plant.price,
        plant.quantity,
        plant.id.dimmed()
    )
}

pub fn details(plant: &Plant) -> Vec<String> {
    let mut lines = vec![
        plant.name.bold().to_string(),
        format!("  id:        {}", plant.id),
        format!("  price:     ${:.2}", plant.price),
        format!("  quantity:  {}", plant.quantity),
    ];
    if let Some(category) = &plant.category {
        lines.push(format!("  category:  {category}"));
    }
    if let Some(description) = &plant.description {
        lines.push(format!("  about:     {description}"));
    }
    if let Some(image) = &plant.image {
        lines.push(format!("  image:     {image}"));
    }
    if let Some(seller) = &plant.seller {
        let name = seller.name.as_deref().unwrap_or("anonymous");
        lines.push(format!("  seller:    {name} <{}>", seller.email));
    }
    lines
}
