use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    mande::cli::main()
}
