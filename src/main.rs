fn main() {
    if let Err(err) = revenue_ingest::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
