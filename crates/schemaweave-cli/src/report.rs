//! Terminal output.

use colored::Colorize;
use schemaweave_model::{
    AttributeTarget, Corpus, EntityRelationship, ResolvedAttributeSet, ResolvedEntity, StatusCallback, StatusLevel,
};

pub fn status_line(level: StatusLevel, message: &str, path: &str) -> String {
    let tag = match level {
        StatusLevel::Info => "info".dimmed(),
        StatusLevel::Progress => "progress".cyan(),
        StatusLevel::Warning => "warning".yellow().bold(),
        StatusLevel::Error => "error".red().bold(),
    };
    if path.is_empty() {
        format!("{tag}: {message}")
    } else {
        format!("{tag}: {message} {}", format!("({path})").dimmed())
    }
}

/// Status callback writing colored lines to stderr.
pub fn stderr_status() -> StatusCallback {
    Box::new(|level: StatusLevel, message: &str, path: &str| {
        eprintln!("{}", status_line(level, message, path));
    })
}

pub fn print_entity(corpus: &Corpus, resolved: &ResolvedEntity) {
    println!("{} {}", "entity".green().bold(), resolved.name.bold());
    let traits = resolved.traits.names();
    if !traits.is_empty() {
        println!("  traits: {}", traits.join(", "));
    }
    print_attributes(&resolved.attributes, resolved.primary_key.as_deref(), 1);
    for reference in resolved.entity_references.iter() {
        let target = reference
            .referenced_entity
            .and_then(|id| corpus.object(id))
            .and_then(|o| o.corpus_path.clone())
            .unwrap_or_else(|| "(unresolved)".to_string());
        let key = reference.referenced_attribute.as_deref().unwrap_or("?");
        println!(
            "  {} {} → {target}.{key}",
            "reference".yellow(),
            reference.referencing_attribute
        );
    }
}

fn print_attributes(set: &ResolvedAttributeSet, primary_key: Option<&str>, depth: usize) {
    let indent = "  ".repeat(depth);
    for ra in set.iter() {
        match &ra.target {
            AttributeTarget::Set(nested) => {
                println!("{indent}{}", format!("{}/", ra.resolved_name).bold());
                print_attributes(nested, primary_key, depth + 1);
            }
            AttributeTarget::Attribute(_) => {
                let props = ra.properties();
                let mut notes = Vec::new();
                if let Some(format) = &props.data_format {
                    notes.push(format.clone());
                }
                if props.is_primary_key || primary_key == Some(ra.resolved_name.as_str()) {
                    notes.push("primary key".to_string());
                }
                if set.is_inherited(&ra.resolved_name) {
                    notes.push("inherited".to_string());
                }
                if props.is_nullable {
                    notes.push("nullable".to_string());
                }
                if let Some(max) = props.maximum_length {
                    notes.push(format!("max {max}"));
                }
                if notes.is_empty() {
                    println!("{indent}{}", ra.resolved_name);
                } else {
                    println!("{indent}{} {}", ra.resolved_name, format!("[{}]", notes.join(", ")).dimmed());
                }
            }
        }
    }
}

pub fn print_relationship(relationship: &EntityRelationship) {
    let to = match &relationship.to_attribute {
        Some(attribute) => format!("{}.{attribute}", relationship.to_entity),
        None => relationship.to_entity.clone(),
    };
    println!(
        "{}.{} {} {}",
        relationship.from_entity,
        relationship.from_attribute,
        "→".yellow(),
        to
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_carry_level_and_path() {
        colored::control::set_override(false);
        assert_eq!(
            status_line(StatusLevel::Warning, "unable to resolve", "/a.cdm.json"),
            "warning: unable to resolve (/a.cdm.json)"
        );
        assert_eq!(status_line(StatusLevel::Error, "boom", ""), "error: boom");
    }
}
