// cvar.rs - console variables and command-line overrides

use std::collections::HashMap;

use log::debug;

use crate::error::{QError, QResult};

/// Built-in variables and their defaults.
pub const DEFAULT_CVARS: &[(&str, &str)] = &[
    ("basedir", "."),
    ("map", "maps/start.bsp"),
    ("palette", "gfx/palette.lmp"),
    ("vid_width", "640"),
    ("vid_height", "480"),
    ("r_znear", "1"),
    ("r_zfar", "5000"),
    ("timedemo_frames", "0"),
    ("cl_script", ""),
    ("r_dumptextures", ""),
    ("developer", "0"),
];

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
}

impl Cvar {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            string: value.to_string(),
            value: value.parse::<f32>().unwrap_or(0.0),
        }
    }
}

/// Name -> value registry.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in variable at its default.
    pub fn with_defaults() -> Self {
        let mut ctx = Self::new();
        for (name, value) in DEFAULT_CVARS {
            ctx.get(name, value);
        }
        ctx
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. An existing value is left untouched.
    pub fn get(&mut self, name: &str, default: &str) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            return idx;
        }
        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar::new(name, default));
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating it if needed.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value),
        };

        let var = &mut self.cvar_vars[idx];
        if var.string != value {
            var.string = value.to_string();
            var.value = value.parse::<f32>().unwrap_or(0.0);
        }
        idx
    }

    /// Applies `+set name value` triples from the command line (program
    /// name excluded).
    pub fn parse_command_line<S: AsRef<str>>(&mut self, args: &[S]) -> QResult<()> {
        let mut iter = args.iter().map(AsRef::as_ref);
        while let Some(arg) = iter.next() {
            match arg {
                "+set" => {
                    let (name, value) = match (iter.next(), iter.next()) {
                        (Some(n), Some(v)) => (n, v),
                        _ => {
                            return Err(QError::Format(
                                "usage: +set <variable> <value>".into(),
                            ))
                        }
                    };
                    debug!("+set {} \"{}\"", name, value);
                    self.set(name, value);
                }
                other => {
                    return Err(QError::Format(format!(
                        "unknown command line argument \"{}\"",
                        other
                    )))
                }
            }
        }
        Ok(())
    }
}
