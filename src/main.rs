fn main() {
    if let Err(err) = db2access::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
