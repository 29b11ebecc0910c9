fn main() {
    get_cookies::logging::init();
    get_cookies::export();
}
