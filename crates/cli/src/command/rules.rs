use super::{print_json, Environment};
use anyhow::{Context, Result};
use router_matcher::RuleTable;
use serde_json::json;
use std::path::Path;

pub fn rules(env: &Environment, file: Option<&Path>) -> Result<()> {
    let (table, source) = match file {
        Some(path) => (load(path)?, path.display().to_string()),
        None => match env.load_config()?.rules {
            Some(path) => (load(&path)?, path.display().to_string()),
            None => (RuleTable::builtin()?, "builtin".to_string()),
        },
    };

    let rules: Vec<_> = table
        .rules()
        .iter()
        .map(|rule| {
            json!({
                "action": rule.action,
                "category": rule.category(),
                "family": rule.family(),
                "domain": rule.domain,
                "description": rule.description,
                "gated": rule.gated,
                "destructive": rule.destructive,
                "generic_member": rule.generic_member,
            })
        })
        .collect();
    let families: Vec<_> = table
        .families()
        .iter()
        .map(|family| json!({ "verb": family.verb, "phase": family.phase }))
        .collect();

    print_json(&json!({
        "source": source,
        "families": families,
        "rules": rules,
    }))
}

fn load(path: &Path) -> Result<RuleTable> {
    RuleTable::from_path(path).with_context(|| format!("invalid rule table {}", path.display()))
}
