pub mod build;
pub mod dev;
pub mod init;
pub mod serve;

use mortar_static::Mode;

fn mode(prod: bool) -> Mode {
    if prod {
        Mode::Production
    } else {
        Mode::Development
    }
}
