fn main() {
    if let Err(err) = od_catalogue::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
