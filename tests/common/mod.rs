//! Fake Arduino platform and sketch shared by the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Recipes that only touch their outputs, so a build runs without a toolchain.
pub const TOUCH_PLATFORM: &str = r#"
name=Touch Boards
version=1.0.0

# every step just creates its output
compiler.touch=touch
recipe.c.o.pattern={compiler.touch} "{object_file}"
recipe.cpp.o.pattern={compiler.touch} "{object_file}"
recipe.S.o.pattern={compiler.touch} "{object_file}"
recipe.ar.pattern={compiler.touch} "{archive_file_path}"
recipe.c.combine.pattern={compiler.touch} "{build.path}/{build.project_name}.elf"
recipe.objcopy.hex.pattern={compiler.touch} "{build.path}/{build.project_name}.hex"
"#;

pub const BOARDS: &str = "\
uno.name=Arduino Uno
uno.build.board=AVR_UNO
uno.build.core=arduino
uno.build.variant=standard
mega.name=Arduino Mega
mega.build.board=AVR_MEGA2560
mega.build.core=arduino
mega.build.variant=mega
";

pub const BLINK: &str = "\
#include <Servo.h>

Servo servo;

void setup() {
  servo.attach(9);
  blink(3);
}

void loop() {}
";

pub const HELPERS: &str = "\
void blink(int times)
{
  for (int i = 0; i < times; i++) {
    toggle();
  }
}

static void toggle() { }
";

pub fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// Creates `root/hw/avr` (platform), `root/Blink` (sketch) and `root/ardent.toml`.
/// Returns the config path.
pub fn create_project(root: &Path, platform_txt: &str) -> PathBuf {
    let hw = root.join("hw").join("avr");
    write(&hw.join("platform.txt"), platform_txt);
    write(&hw.join("boards.txt"), BOARDS);
    write(&hw.join("cores/arduino/Arduino.h"), "#pragma once\n");
    write(&hw.join("cores/arduino/main.cpp"), "int main() { return 0; }\n");
    write(&hw.join("cores/arduino/wiring.c"), "void init(void) {}\n");
    write(&hw.join("variants/standard/pins_arduino.h"), "\n");
    write(&hw.join("libraries/Servo/src/Servo.h"), "\n");
    write(&hw.join("libraries/Servo/src/Servo.cpp"), "\n");

    write(&root.join("Blink/Blink.ino"), BLINK);
    write(&root.join("Blink/helpers.ino"), HELPERS);

    let config = root.join("ardent.toml");
    write(
        &config,
        "[board]\nplatform = \"hw/avr\"\nid = \"uno\"\n\n[sketch]\npath = \"Blink/Blink.ino\"\n",
    );
    config
}
