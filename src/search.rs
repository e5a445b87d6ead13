use crate::api::VirtualMachine;
use crate::error::OnappError;

/// One `Field=value` filter criterion from the `vm list` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub field: String,
    pub query: String,
}

/// Parse raw CLI filter args into queries.
///
/// Accepted forms: `Field=value` (both sides word characters) or a bare
/// integer, which filters on `Id`. Anything else is reported and skipped.
pub fn parse_filters(args: &[String]) -> Vec<SearchQuery> {
    let mut searches = Vec::new();
    for arg in args {
        let trimmed = arg.trim();
        match split_filter(trimmed) {
            Some((field, value)) => searches.push(SearchQuery {
                field: field.to_string(),
                query: value.to_string(),
            }),
            None => {
                if trimmed.parse::<i64>().is_ok() {
                    searches.push(SearchQuery {
                        field: "Id".into(),
                        query: trimmed.to_string(),
                    });
                } else {
                    tracing::warn!("search query '{arg}' isn't valid");
                }
            }
        }
    }
    searches
}

fn split_filter(arg: &str) -> Option<(&str, &str)> {
    let (field, value) = arg.split_once('=')?;
    let word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');
    if word(field) && word(value) {
        Some((field, value))
    } else {
        None
    }
}

/// Apply one filter to a VM list.
///
/// Field names are case sensitive and dispatch to a typed accessor: string
/// fields match by substring, integer and boolean fields by exact equality.
/// An unknown field name or a query that doesn't parse for the field's type
/// is a validation error.
pub fn apply(q: &SearchQuery, vms: Vec<VirtualMachine>) -> Result<Vec<VirtualMachine>, OnappError> {
    enum Accessor {
        Str(fn(&VirtualMachine) -> &str),
        Int(fn(&VirtualMachine) -> i64),
        Bool(fn(&VirtualMachine) -> bool),
    }

    let accessor = match q.field.as_str() {
        "Label" => Accessor::Str(|vm| &vm.label),
        "Hostname" => Accessor::Str(|vm| &vm.hostname),
        "Template" => Accessor::Str(|vm| &vm.template_label),
        "AdminNote" => Accessor::Str(|vm| &vm.admin_note),
        "Id" => Accessor::Int(|vm| vm.id),
        "User" => Accessor::Int(|vm| vm.user_id),
        "Memory" => Accessor::Int(|vm| vm.memory),
        "Cpus" => Accessor::Int(|vm| vm.cpus),
        "HV" => Accessor::Int(|vm| vm.hypervisor_id),
        "Booted" => Accessor::Bool(|vm| vm.booted),
        "Locked" => Accessor::Bool(|vm| vm.locked),
        other => {
            return Err(OnappError::Validation {
                message: format!("field {other} doesn't exist"),
            });
        }
    };

    match accessor {
        Accessor::Str(get) => Ok(vms.into_iter().filter(|vm| get(vm).contains(&q.query)).collect()),
        Accessor::Int(get) => {
            let wanted: i64 = q.query.parse().map_err(|_| OnappError::Validation {
                message: format!("{} is an int field, {} is not an int", q.field, q.query),
            })?;
            Ok(vms.into_iter().filter(|vm| get(vm) == wanted).collect())
        }
        Accessor::Bool(get) => {
            let wanted: bool = q.query.parse().map_err(|_| OnappError::Validation {
                message: format!("{} is a bool field, {} is not a bool", q.field, q.query),
            })?;
            Ok(vms.into_iter().filter(|vm| get(vm) == wanted).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Vec<VirtualMachine> {
        vec![
            VirtualMachine {
                id: 1,
                label: "prod-web".into(),
                hostname: "web.example.com".into(),
                user_id: 7,
                memory: 1024,
                booted: true,
                ..Default::default()
            },
            VirtualMachine {
                id: 2,
                label: "prod-db".into(),
                hostname: "db.example.com".into(),
                user_id: 7,
                memory: 4096,
                booted: false,
                ..Default::default()
            },
            VirtualMachine {
                id: 3,
                label: "staging-web".into(),
                hostname: "stage.example.net".into(),
                user_id: 9,
                memory: 1024,
                booted: true,
                ..Default::default()
            },
        ]
    }

    fn q(field: &str, query: &str) -> SearchQuery {
        SearchQuery {
            field: field.into(),
            query: query.into(),
        }
    }

    #[test]
    fn string_fields_match_by_substring() {
        let out = apply(&q("Label", "prod"), fleet()).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply(&q("Hostname", "example.net"), fleet()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 3);
    }

    #[test]
    fn substring_match_is_case_sensitive() {
        assert!(apply(&q("Label", "PROD"), fleet()).unwrap().is_empty());
    }

    #[test]
    fn int_fields_match_exactly() {
        let out = apply(&q("User", "7"), fleet()).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply(&q("Memory", "1024"), fleet()).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply(&q("Id", "2"), fleet()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn bool_fields_match_exactly() {
        let out = apply(&q("Booted", "true"), fleet()).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply(&q("Booted", "false"), fleet()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn unknown_field_is_an_error() {
        assert!(apply(&q("label", "prod"), fleet()).is_err()); // names are case sensitive
        assert!(apply(&q("Nonsense", "x"), fleet()).is_err());
    }

    #[test]
    fn mistyped_query_is_an_error() {
        assert!(apply(&q("Memory", "lots"), fleet()).is_err());
        assert!(apply(&q("Booted", "maybe"), fleet()).is_err());
    }

    #[test]
    fn parse_filters_accepts_pairs_and_bare_ids() {
        let args: Vec<String> = vec!["Label=prod".into(), "42".into(), "!!bad!!".into()];
        let filters = parse_filters(&args);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0], q("Label", "prod"));
        assert_eq!(filters[1], q("Id", "42"));
    }

    #[test]
    fn filters_compose() {
        let mut vms = fleet();
        for f in parse_filters(&["User=7".to_string(), "Booted=true".to_string()]) {
            vms = apply(&f, vms).unwrap();
        }
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].id, 1);
    }
}
