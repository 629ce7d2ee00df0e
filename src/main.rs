fn main() {
    tryon_studio_lib::run()
}
