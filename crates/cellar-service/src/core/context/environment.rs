use std::collections::hash_map::IntoIter;
use std::collections::HashMap;
use std::env;
use std::ops::Deref;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde_json::{Number, Value};

use crate::core::Error;

static CONFIGURATION_SPECIFICATION: &str = include_str!("../../../../../resources/specification/configuration.json");

const ENVIRONMENT_PREFIX: &str = "CELLAR_";

lazy_static! {
    static ref IS_ARGUMENT: regex::Regex = regex::Regex::new(r"^--([^=]+)=(.+)$").expect("invalid regex");
    static ref IS_STRING: regex::Regex = regex::Regex::new(r"^'([^']*)'$").expect("invalid regex");
    static ref IS_NUMBER: regex::Regex = regex::Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("invalid regex");
    static ref IS_ARRAY: regex::Regex = regex::Regex::new(r"^\[(.*)\]$").expect("invalid regex");
}

/// Location of a value in the configuration, e.g. `ledger.network`
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct JSONPath(Vec<String>);

impl Deref for JSONPath {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl JSONPath {
    pub fn from_str(s: &str) -> Self {
        JSONPath(s.split('.').map(|x| x.to_lowercase()).collect())
    }

    /// Name of the variable setting this path, e.g. `ledger_network`
    fn variable(&self) -> String {
        self.0.join("_")
    }
}

/// Maps variable names, from the environment or the command line, to their configuration path
#[derive(Debug)]
pub struct VariablesResolver(HashMap<String, JSONPath>);

impl VariablesResolver {
    /// Every leaf of the configuration specification becomes a variable
    pub fn initialize() -> Result<Self, Error> {
        fn leaves(path: Vec<String>, value: Value, into: &mut Vec<JSONPath>) {
            match value {
                Value::Object(fields) => {
                    for (field, value) in fields {
                        let mut path = path.clone();
                        path.push(field);

                        leaves(path, value, into);
                    }
                },
                _ => into.push(JSONPath(path)),
            }
        }

        let specification: Value = serde_json::from_str(CONFIGURATION_SPECIFICATION).map_err(|e| Error::Configuration(format!("specification: {}", e)))?;

        let mut paths = vec![JSONPath::from_str("profile")];
        leaves(vec![], specification, &mut paths);

        Ok(Self(paths.into_iter().map(|x| (x.variable(), x)).collect()))
    }

    pub fn resolve_environment(&self) -> Result<Variables, Error> {
        let variables = envy::prefixed(ENVIRONMENT_PREFIX)
            .from_env::<HashMap<String, String>>()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        self.resolve_variables(variables)
    }

    pub fn resolve_arguments(&self) -> Result<Variables, Error> {
        let mut arguments = HashMap::new();
        for argument in env::args().skip(1) {
            let Some(captures) = IS_ARGUMENT.captures(&argument) else {
                return Err(Error::Configuration(format!("invalid argument {}, must be of the form '--xxx=yyy'", argument)));
            };

            arguments.insert(captures[1].trim().to_string(), captures[2].to_string());
        }

        self.resolve_variables(arguments)
    }

    /// Unknown names are ignored
    fn resolve_variables(&self, variables: HashMap<String, String>) -> Result<Variables, Error> {
        let mut resolved = HashMap::new();
        for (name, value) in variables {
            if let Some(path) = self.0.get(&name.to_lowercase()) {
                resolved.insert(path.clone(), Self::decode_value(&value)?);
            }
        }

        Ok(Variables(resolved))
    }

    /// `true`/`false`, numbers and `[a,b]` arrays are typed, `'quoted'` values are always
    /// strings, anything else is a string as is
    fn decode_value(value: &str) -> Result<Value, Error> {
        if let Some(captures) = IS_STRING.captures(value) {
            return Ok(Value::String(captures[1].to_string()));
        }

        if let Some(captures) = IS_ARRAY.captures(value) {
            let elements = captures[1].trim();
            if elements.is_empty() {
                return Ok(Value::Array(vec![]));
            }

            return elements.split(',').map(|x| Self::decode_value(x.trim())).collect::<Result<Vec<_>, _>>().map(Value::Array);
        }

        Ok(match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            value if IS_NUMBER.is_match(value) => Number::from_str(value)
                .map(Value::Number)
                .map_err(|e| Error::Configuration(e.to_string()))?,
            value => Value::String(value.to_string()),
        })
    }
}

pub struct Variables(HashMap<JSONPath, Value>);

impl Variables {
    pub fn get(&self, s: &str) -> Option<&Value> {
        self.0.get(&JSONPath::from_str(s))
    }

    pub fn into_iter(self) -> IntoIter<JSONPath, Value> {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{json, Value};

    use super::{JSONPath, VariablesResolver};

    #[test]
    fn path_is_case_insensitive() {
        assert_eq!(JSONPath::from_str("LEDGER.Network").0, vec!["ledger".to_string(), "network".to_string()]);
        assert_eq!(JSONPath::from_str("mint.reward_treasury.id").variable(), "mint_reward_treasury_id");
    }

    #[test]
    fn specification_declares_the_configuration() {
        let resolver = VariablesResolver::initialize().unwrap();

        for variable in ["profile", "rpc_port", "ledger_network", "sponsoring_api_key", "mint_custodial_key", "admin_key"] {
            assert!(resolver.0.contains_key(variable), "{} is not declared", variable);
        }
    }

    #[test]
    fn values_are_decoded() {
        let cases = vec![
            ("0", json!(0)),
            ("94.65", json!(94.65)),
            ("true", json!(true)),
            ("false", json!(false)),
            ("''", json!("")),
            ("'8080'", json!("8080")),
            ("[]", json!([])),
            ("[94,95]", json!([94, 95])),
            ("['https://a','https://b']", json!(["https://a", "https://b"])),
            ("0x2a", json!("0x2a")),
        ];

        for (raw, expected) in cases {
            assert_eq!(VariablesResolver::decode_value(raw).unwrap(), expected, "{}", raw);
        }
    }

    #[test]
    fn environment_names_resolve_to_paths() {
        let resolver = VariablesResolver::initialize().unwrap();

        let variables = resolver
            .resolve_variables(HashMap::from([
                ("LEDGER_NETWORK".to_string(), "testnet".to_string()),
                ("UNKNOWN_VARIABLE".to_string(), "ignored".to_string()),
            ]))
            .unwrap();

        assert_eq!(variables.get("ledger.network"), Some(&Value::String("testnet".to_string())));
        assert_eq!(variables.into_iter().count(), 1);
    }
}
