use miette::Result;

pub fn run() -> Result<()> {
    println!("astplay {}", astplay_core::VERSION);
    Ok(())
}
