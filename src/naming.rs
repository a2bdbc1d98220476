//! Names the javac lambda translation produces, and the ones synthesized in
//! their place.

/// Owner of `metafactory` and `altMetafactory`.
pub const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

/// Name of the static method a synthesized lambda class exposes.
pub const FACTORY_METHOD_NAME: &str = "lambdaFactory$";

const LAMBDA_PREFIX: &str = "lambda$";

/// Whether `name` is a lambda body: `lambda$<n>` or `lambda$<anything>$<n>`,
/// where `<n>` is one or more decimal digits.
pub fn is_lambda_implementation(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(LAMBDA_PREFIX) else {
        return false;
    };
    let counter = match rest.rsplit_once('$') {
        Some((_, counter)) => counter,
        None => rest,
    };
    !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit())
}

/// `<owner>$$Lambda$<seq>`
pub fn lambda_class_name(owner: &str, sequence: u32) -> String {
    format!("{owner}$$Lambda${sequence}")
}
