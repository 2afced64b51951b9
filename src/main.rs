fn main() {
    if let Err(err) = vitalwatch_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
