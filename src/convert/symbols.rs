//! The closed table of LaTeX commands the converters understand.
//!
//! Each entry maps a command to its Unicode character, the MathML token it
//! becomes, and its AsciiMath spelling. Anything not listed here is passed
//! through untouched by every converter.

/// MathML token element a symbol is emitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Identifier (`<mi>`).
    Identifier,
    /// Operator (`<mo>`).
    Operator,
}

impl Token {
    pub fn tag(self) -> &'static str {
        match self {
            Token::Identifier => "mi",
            Token::Operator => "mo",
        }
    }
}

/// One named LaTeX symbol.
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    /// Command name without the leading backslash.
    pub command: &'static str,
    pub unicode: char,
    pub token: Token,
    pub asciimath: &'static str,
}

const fn sym(command: &'static str, unicode: char, token: Token, asciimath: &'static str) -> Symbol {
    Symbol {
        command,
        unicode,
        token,
        asciimath,
    }
}

use Token::{Identifier as I, Operator as O};

pub static SYMBOLS: &[Symbol] = &[
    // Lowercase Greek
    sym("alpha", 'α', I, "alpha"),
    sym("beta", 'β', I, "beta"),
    sym("gamma", 'γ', I, "gamma"),
    sym("delta", 'δ', I, "delta"),
    sym("epsilon", 'ϵ', I, "epsilon"),
    sym("varepsilon", 'ε', I, "varepsilon"),
    sym("zeta", 'ζ', I, "zeta"),
    sym("eta", 'η', I, "eta"),
    sym("theta", 'θ', I, "theta"),
    sym("vartheta", 'ϑ', I, "vartheta"),
    sym("iota", 'ι', I, "iota"),
    sym("kappa", 'κ', I, "kappa"),
    sym("lambda", 'λ', I, "lambda"),
    sym("mu", 'μ', I, "mu"),
    sym("nu", 'ν', I, "nu"),
    sym("xi", 'ξ', I, "xi"),
    sym("pi", 'π', I, "pi"),
    sym("rho", 'ρ', I, "rho"),
    sym("sigma", 'σ', I, "sigma"),
    sym("tau", 'τ', I, "tau"),
    sym("upsilon", 'υ', I, "upsilon"),
    sym("phi", 'ϕ', I, "phi"),
    sym("varphi", 'φ', I, "varphi"),
    sym("chi", 'χ', I, "chi"),
    sym("psi", 'ψ', I, "psi"),
    sym("omega", 'ω', I, "omega"),
    // Uppercase Greek
    sym("Gamma", 'Γ', I, "Gamma"),
    sym("Delta", 'Δ', I, "Delta"),
    sym("Theta", 'Θ', I, "Theta"),
    sym("Lambda", 'Λ', I, "Lambda"),
    sym("Xi", 'Ξ', I, "Xi"),
    sym("Pi", 'Π', I, "Pi"),
    sym("Sigma", 'Σ', I, "Sigma"),
    sym("Phi", 'Φ', I, "Phi"),
    sym("Psi", 'Ψ', I, "Psi"),
    sym("Omega", 'Ω', I, "Omega"),
    // Large operators
    sym("sum", '∑', O, "sum"),
    sym("prod", '∏', O, "prod"),
    sym("int", '∫', O, "int"),
    sym("oint", '∮', O, "oint"),
    // Named symbols
    sym("infty", '∞', I, "oo"),
    sym("partial", '∂', I, "del"),
    sym("nabla", '∇', I, "grad"),
    sym("pm", '±', O, "+-"),
    sym("mp", '∓', O, "-+"),
    sym("times", '×', O, "xx"),
    sym("div", '÷', O, "-:"),
    sym("cdot", '⋅', O, "*"),
    sym("leq", '≤', O, "<="),
    sym("le", '≤', O, "<="),
    sym("geq", '≥', O, ">="),
    sym("ge", '≥', O, ">="),
    sym("neq", '≠', O, "!="),
    sym("ne", '≠', O, "!="),
    sym("approx", '≈', O, "~~"),
    sym("equiv", '≡', O, "-="),
    sym("to", '→', O, "->"),
    sym("rightarrow", '→', O, "->"),
    sym("leftarrow", '←', O, "larr"),
    sym("Rightarrow", '⇒', O, "=>"),
    sym("in", '∈', O, "in"),
    sym("notin", '∉', O, "!in"),
    sym("subset", '⊂', O, "sub"),
    sym("cup", '∪', O, "uu"),
    sym("cap", '∩', O, "nn"),
    sym("forall", '∀', O, "AA"),
    sym("exists", '∃', O, "EE"),
];

/// Look up a command (without the backslash).
pub fn lookup(command: &str) -> Option<&'static Symbol> {
    SYMBOLS.iter().find(|s| s.command == command)
}

/// Reverse lookup from a Unicode character to its AsciiMath spelling.
pub fn asciimath_for_char(c: char) -> Option<&'static str> {
    SYMBOLS.iter().find(|s| s.unicode == c).map(|s| s.asciimath)
}

/// Replace every known `\command` in `input` using `render`.
///
/// A command is a backslash followed by ASCII letters; unknown commands and
/// all other text are copied through unchanged.
pub fn replace_commands<F>(input: &str, mut render: F) -> String
where
    F: FnMut(&Symbol) -> String,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let name = &after[..name_len];

        match lookup(name) {
            Some(symbol) if name_len > 0 => out.push_str(&render(symbol)),
            _ => {
                out.push('\\');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}
