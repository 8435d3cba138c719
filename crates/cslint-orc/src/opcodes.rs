//! Opcode type catalog and signature matching.
//!
//! An [`OpcodeCatalog`] maps opcode names to their overloads: each
//! overload is an input type signature paired with the set of output
//! type signatures published for it. The host engine supplies the real
//! catalog by querying its opcode registry once at startup; a built-in
//! subset behind `OnceLock` stands in for tests and standalone use.
//!
//! Type codes in input signatures:
//!
//! - required: `i` `k` `a` `x` `S` `T` `f` `w`, wildcard `.`/`*`,
//!   plus `[]` suffixes for arrays
//! - optional (i-rate, with a documented default): `o`=0 `j`=-1 `v`=0.5
//!   `p`=1 `q`=10 `h`=127
//! - variable arity: `m` (0..N i-rate), `z` (0..N k-rate), `n` (odd
//!   count of i-rate), `Z` (k,a pairs), `y` (0..N a-rate)

use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};

/// One opcode with all of its overloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub name: String,
    /// input signature → output signatures published for it.
    pub overloads: IndexMap<String, Vec<String>>,
    /// True iff every overload's output set is empty.
    pub is_void: bool,
}

/// Name → overloads table, built once and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct OpcodeCatalog {
    entries: IndexMap<String, OpcodeEntry>,
}

impl OpcodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one published (input, output) signature pair.
    ///
    /// Normalizes the known upstream signature typos before insertion
    /// and drops duplicate output signatures. An output signature of
    /// `"0"` (or empty) publishes no outputs.
    pub fn add_entry(&mut self, name: &str, input_signature: &str, output_signature: &str) {
        let input_signature = normalize_input_signature(name, input_signature);
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| OpcodeEntry {
                name: name.to_string(),
                overloads: IndexMap::new(),
                is_void: true,
            });
        let outputs = entry.overloads.entry(input_signature).or_default();
        let output_signature = if output_signature == "0" {
            ""
        } else {
            output_signature
        };
        if !output_signature.is_empty() {
            entry.is_void = false;
            if !outputs.iter().any(|existing| existing == output_signature) {
                outputs.push(output_signature.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&OpcodeEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fix the known incorrect type characters in published signatures
/// before they reach the catalog.
fn normalize_input_signature(name: &str, input_signature: &str) -> String {
    match (name, input_signature) {
        ("FLslidBnk2", "Iiiiooooo") => "iiiiooooo".to_string(),
        ("changed2", "*[]") => ".[]".to_string(),
        ("spectrum", "siiiqoooo") => "xiiiqoooo".to_string(),
        _ => input_signature.to_string(),
    }
}

/// Built-in catalog used when the host engine's registry is not
/// available. Signatures follow the published Csound entries.
pub fn builtin() -> &'static Arc<OpcodeCatalog> {
    static CATALOG: OnceLock<Arc<OpcodeCatalog>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let mut catalog = OpcodeCatalog::new();
        for (name, output, input) in [
            ("event", "", "Sz"),
            ("fillarray", "i[]", "m"),
            ("ftgen", "i", "iiiim"),
            ("init", "i", "i"),
            ("init", "k", "i"),
            ("init", "a", "i"),
            ("init", "i[]", "i"),
            ("init", "k[]", "i"),
            ("init", "a[]", "i"),
            ("init", "i[][]", "ii"),
            ("init", "k[][]", "ii"),
            ("init", "i[][][]", "iii"),
            ("lenarray", "i", ".[]o"),
            ("oscili", "a", "xxjo"),
            ("oscili", "a", "aajo"),
            ("out", "", "a"),
            ("outc", "", "y"),
            ("outch", "", "Z"),
            ("pow", "i", "iip"),
            ("printf_i", "", "Sim"),
            ("prints", "", "Sm"),
            ("rand", "a", "xvoo"),
            ("rms", "k", "aqo"),
            ("scoreline_i", "", "S"),
            ("tablexseg", "", "iin"),
            ("veloc", "i", "oh"),
            // Entries whose published signatures carry upstream typos;
            // normalized on insertion.
            ("FLslidBnk2", "", "Iiiiooooo"),
            ("changed2", "k", "*[]"),
            ("spectrum", "w", "siiiqoooo"),
        ] {
            catalog.add_entry(name, input, output);
        }
        Arc::new(catalog)
    })
}

// ----------------------------------------------------------------------
// Signature matching
// ----------------------------------------------------------------------

/// One parsed element of an input signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SigElem {
    Required(char, u8),
    /// Optional i-rate code with its documented default.
    Optional(char),
    VarArity(char),
}

/// Documented default value for an optional input code, as text.
pub fn optional_default(code: char) -> Option<&'static str> {
    match code {
        'o' => Some("0"),
        'j' => Some("-1"),
        'v' => Some("0.5"),
        'p' => Some("1"),
        'q' => Some("10"),
        'h' => Some("127"),
        _ => None,
    }
}

fn parse_signature(signature: &str) -> Option<Vec<SigElem>> {
    if signature == "0" {
        return Some(Vec::new());
    }
    let chars: Vec<char> = signature.chars().collect();
    let mut elems = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let code = chars[i];
        i += 1;
        let mut dims = 0u8;
        while chars.get(i) == Some(&'[') && chars.get(i + 1) == Some(&']') {
            dims += 1;
            i += 2;
        }
        let elem = if optional_default(code).is_some() {
            SigElem::Optional(code)
        } else if matches!(code, 'm' | 'z' | 'n' | 'Z' | 'y' | 'M' | 'N') {
            SigElem::VarArity(code)
        } else if matches!(code, 'i' | 'k' | 'a' | 'x' | 'S' | 'T' | 'f' | 'w' | '.' | '*') {
            SigElem::Required(code, dims)
        } else {
            // Unknown published code: treat as wildcard so an odd
            // engine entry does not produce spurious mismatches.
            SigElem::Required('.', dims)
        };
        elems.push(elem);
    }
    Some(elems)
}

/// Split an argument type like `"k[][]"` into its base and dimensions.
fn split_arg(arg: &str) -> (char, u8) {
    let mut chars = arg.chars();
    let base = chars.next().unwrap_or('\0');
    let dims = (arg.len().saturating_sub(1) / 2) as u8;
    (base, dims)
}

/// Can an argument of rate `arg` feed an input of code `code`?
fn base_compatible(code: char, arg: char) -> bool {
    match code {
        'i' | 'o' | 'j' | 'v' | 'p' | 'q' | 'h' | 'm' | 'n' => arg == 'i',
        'k' | 'z' => matches!(arg, 'k' | 'i'),
        'a' | 'y' => arg == 'a',
        'x' | 'M' | 'N' => matches!(arg, 'a' | 'k' | 'i'),
        'S' => arg == 'S',
        'T' => matches!(arg, 'S' | 'i'),
        'f' => arg == 'f',
        'w' => arg == 'w',
        _ => false,
    }
}

fn compatible(code: char, dims: u8, arg: &str) -> bool {
    if arg.is_empty() {
        return false;
    }
    let (base, arg_dims) = split_arg(arg);
    if code == '.' || code == '*' {
        return if dims == 0 { true } else { arg_dims >= 1 };
    }
    arg_dims == dims && base_compatible(code, base)
}

/// A successfully matched overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub input_signature: String,
    pub outputs: Vec<String>,
    /// Argument indices consumed by optional codes, with the code.
    pub optional_uses: Vec<(usize, char)>,
}

/// Match the supplied argument types against every overload of an
/// opcode; returns each overload they satisfy.
pub fn match_overloads(entry: &OpcodeEntry, args: &[String]) -> Vec<SignatureMatch> {
    let mut matches = Vec::new();
    for (input_signature, outputs) in &entry.overloads {
        if let Some(optional_uses) = match_signature(input_signature, args) {
            matches.push(SignatureMatch {
                input_signature: input_signature.clone(),
                outputs: outputs.clone(),
                optional_uses,
            });
        }
    }
    matches
}

fn match_signature(signature: &str, args: &[String]) -> Option<Vec<(usize, char)>> {
    let elems = parse_signature(signature)?;
    let mut optional_uses = Vec::new();
    let mut ai = 0usize;
    for elem in elems {
        match elem {
            SigElem::Required(code, dims) => {
                let arg = args.get(ai)?;
                if !compatible(code, dims, arg) {
                    return None;
                }
                ai += 1;
            }
            SigElem::Optional(code) => {
                if let Some(arg) = args.get(ai) {
                    if !compatible(code, 0, arg) {
                        return None;
                    }
                    optional_uses.push((ai, code));
                    ai += 1;
                }
            }
            SigElem::VarArity(code) => {
                let rest = &args[ai.min(args.len())..];
                match code {
                    'n' => {
                        if rest.len() % 2 == 0 {
                            return None;
                        }
                        if !rest.iter().all(|arg| compatible('i', 0, arg)) {
                            return None;
                        }
                    }
                    'Z' => {
                        if rest.len() < 2 || rest.len() % 2 != 0 {
                            return None;
                        }
                        for (i, arg) in rest.iter().enumerate() {
                            let code = if i % 2 == 0 { 'k' } else { 'a' };
                            if !compatible(code, 0, arg) {
                                return None;
                            }
                        }
                    }
                    _ => {
                        if !rest.iter().all(|arg| compatible(code, 0, arg)) {
                            return None;
                        }
                    }
                }
                ai = args.len();
            }
        }
    }
    if ai == args.len() {
        Some(optional_uses)
    } else {
        None
    }
}
