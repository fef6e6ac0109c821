fn main() {
    medscore_lib::run()
}
