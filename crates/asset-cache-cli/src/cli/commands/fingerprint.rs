use super::parse_key;
use crate::cli::args::KeyArgs;
use crate::exit_codes;

pub fn run(args: KeyArgs) -> anyhow::Result<i32> {
    let key = parse_key(&args.key)?;
    println!("{}", asset_cache::fingerprint(&key));
    Ok(exit_codes::SUCCESS)
}
