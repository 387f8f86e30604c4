//! Fixed-subset LaTeX → Unicode rewriting.
//!
//! Worker output is full of inline math from scientific write-ups. Rather than
//! render LaTeX, a short ordered pipeline rewrites the handful of constructs
//! that actually show up into display glyphs. Anything outside the table is
//! left untouched.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Combining overline, appended after every character of a `\bar{}` argument.
const COMBINING_OVERLINE: char = '\u{0305}';

static DISPLAY_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$|\\\(|\\\)|\\\[|\\\]").expect("static regex"));
static TEXT_MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:text|textrm|mathrm)\{([^{}]*)\}").expect("static regex"));
static BAR_MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:bar|overline)\{([^{}]*)\}").expect("static regex"));
static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^(?:\{([+-]?\d+)\}|([+-]?\d+))").expect("static regex"));
static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(?:\{([+-]?\d+)\}|([+-]?\d+))").expect("static regex"));
static NAMED_MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").expect("static regex"));
static ENERGY_CUTOFF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"E_(?:\{\s*cut\s*\}|cut\b)").expect("static regex"));
static SCIENTIFIC_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b1e-(10|8|6|5|4|3)\b").expect("static regex"));
static UNIT_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d)(Ry|eV|meV|Ha|GPa|nm|fs|ps|K|Å)\b").expect("static regex")
});

const SYMBOLS: &[(&str, &str)] = &[
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("Gamma", "Γ"),
    ("delta", "δ"),
    ("Delta", "Δ"),
    ("epsilon", "ε"),
    ("varepsilon", "ε"),
    ("eta", "η"),
    ("theta", "θ"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("Sigma", "Σ"),
    ("tau", "τ"),
    ("phi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("Psi", "Ψ"),
    ("omega", "ω"),
    ("Omega", "Ω"),
    ("approx", "≈"),
    ("times", "×"),
    ("cdot", "·"),
    ("pm", "±"),
    ("mp", "∓"),
    ("leq", "≤"),
    ("le", "≤"),
    ("geq", "≥"),
    ("ge", "≥"),
    ("neq", "≠"),
    ("ne", "≠"),
    ("sim", "~"),
    ("propto", "∝"),
    ("infty", "∞"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("sum", "∑"),
    ("int", "∫"),
    ("rightarrow", "→"),
    ("to", "→"),
    ("leftarrow", "←"),
    ("Rightarrow", "⇒"),
    ("hbar", "ħ"),
    ("AA", "Å"),
    ("circ", "°"),
    ("degree", "°"),
    ("langle", "⟨"),
    ("rangle", "⟩"),
];

const FORMULAS: &[(&str, &str)] = &[
    ("H2O", "H₂O"),
    ("CO2", "CO₂"),
    ("SiO2", "SiO₂"),
    ("TiO2", "TiO₂"),
    ("CH4", "CH₄"),
    ("NH3", "NH₃"),
];

fn superscript(c: char) -> char {
    match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        other => other,
    }
}

fn subscript(c: char) -> char {
    match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' => '₋',
        other => other,
    }
}

fn script_digits(caps: &Captures<'_>, map: fn(char) -> char) -> String {
    let digits = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str());
    digits.chars().map(map).collect()
}

/// Remove `$$`, `$`, `\(`, `\)`, `\[` and `\]`.
fn strip_math_delimiters(text: &str) -> String {
    DISPLAY_MATH.replace_all(text, "").replace('$', "")
}

/// `\text{X}` → `X`, with one separating space unless whitespace precedes it.
fn unwrap_text_macros(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in TEXT_MACRO.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let preceded_by_space = out.chars().next_back().is_none_or(char::is_whitespace);
        if !preceded_by_space {
            out.push(' ');
        }
        out.push_str(caps.get(1).map_or("", |m| m.as_str()));
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn overline(text: &str) -> Cow<'_, str> {
    BAR_MACRO.replace_all(text, |caps: &Captures<'_>| {
        caps.get(1)
            .map_or("", |m| m.as_str())
            .chars()
            .flat_map(|c| [c, COMBINING_OVERLINE])
            .collect::<String>()
    })
}

fn scripts(text: &str) -> String {
    let text = SUPERSCRIPT.replace_all(text, |caps: &Captures<'_>| script_digits(caps, superscript));
    SUBSCRIPT
        .replace_all(&text, |caps: &Captures<'_>| script_digits(caps, subscript))
        .into_owned()
}

fn symbols(text: &str) -> Cow<'_, str> {
    NAMED_MACRO.replace_all(text, |caps: &Captures<'_>| {
        let name = caps.get(1).map_or("", |m| m.as_str());
        SYMBOLS
            .iter()
            .find(|(macro_name, _)| *macro_name == name)
            .map_or_else(|| caps[0].to_string(), |(_, glyph)| glyph.to_string())
    })
}

fn domain_literals(text: &str) -> String {
    let text = ENERGY_CUTOFF.replace_all(text, "Ecut");
    let mut out = SCIENTIFIC_LITERAL
        .replace_all(&text, |caps: &Captures<'_>| {
            let exponent: String = caps[1].chars().map(superscript).collect();
            format!("10⁻{exponent}")
        })
        .into_owned();
    for &(from, to) in FORMULAS {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    UNIT_SPACING.replace_all(&out, "$1 $2").into_owned()
}

/// Rewrite the supported LaTeX subset into Unicode display glyphs.
///
/// Stages run in a fixed order: math delimiters, text macros, overlines,
/// super/subscripts, the symbol table, then domain-specific literals.
pub fn apply_latex_transformations(text: &str) -> String {
    let text = strip_math_delimiters(text);
    let text = unwrap_text_macros(&text);
    let text = overline(&text);
    let text = scripts(&text);
    let text = symbols(&text);
    domain_literals(&text)
}
