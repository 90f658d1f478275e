use ardent::platform::{self, ConfigStore};
use ardent::sketch::{self, DeclarationScanner};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const PLATFORM_TXT: &str = r#"
name=Arduino AVR Boards
version=1.8.6

compiler.warning_flags=-w
compiler.path={runtime.tools.avr-gcc.path}/bin/
compiler.c.cmd=avr-gcc
compiler.c.flags=-c -g -Os {compiler.warning_flags} -std=gnu11 -ffunction-sections -fdata-sections -MMD -flto -fno-fat-lto-objects
compiler.cpp.cmd=avr-g++
compiler.cpp.flags=-c -g -Os {compiler.warning_flags} -std=gnu++11 -fpermissive -fno-exceptions -ffunction-sections -fdata-sections -fno-threadsafe-statics -Wno-error=narrowing -MMD -flto
compiler.c.extra_flags=
compiler.cpp.extra_flags=
build.extra_flags=

recipe.c.o.pattern="{compiler.path}{compiler.c.cmd}" {compiler.c.flags} -mmcu={build.mcu} -DF_CPU={build.f_cpu} -DARDUINO={runtime.ide.version} -DARDUINO_{build.board} -DARDUINO_ARCH_{build.arch} {compiler.c.extra_flags} {build.extra_flags} {includes} "{source_file}" -o "{object_file}"
recipe.cpp.o.pattern="{compiler.path}{compiler.cpp.cmd}" {compiler.cpp.flags} -mmcu={build.mcu} -DF_CPU={build.f_cpu} -DARDUINO={runtime.ide.version} -DARDUINO_{build.board} -DARDUINO_ARCH_{build.arch} -DARDUINO_BOARD="{build.board}" {compiler.cpp.extra_flags} {build.extra_flags} {includes} "{source_file}" -o "{object_file}"
"#;

const BOARDS_TXT: &str = r#"
uno.name=Arduino Uno
uno.upload.tool=avrdude
uno.upload.maximum_size=32256
uno.build.mcu=atmega328p
uno.build.f_cpu=16000000L
uno.build.board=AVR_UNO
uno.build.core=arduino
uno.build.variant=standard
mega.name=Arduino Mega or Mega 2560
mega.build.mcu=atmega2560
mega.build.f_cpu=16000000L
mega.build.board=AVR_MEGA2560
"#;

const SKETCH: &str = r#"
#include <Servo.h>
#include <Wire.h>

const int pins[] = {2, 3, 4};
Servo servo;

/* Moves the servo back and forth.
   void notAFunction() { */
void sweep(int from, int to)
{
  for (int pos = from; pos <= to; pos++) {
    servo.write(pos);
    delay(15);
  }
}

void setup() {
  servo.attach(9);
  Serial.begin(9600);
}

void loop() {
  sweep(0, 180); // there
  sweep(180, 0); // and back
  if (Serial.available()) {
    Serial.println("{ braces }");
  }
}
"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_platform_txt", |b| {
        b.iter(|| platform::parse(black_box(PLATFORM_TXT), None).unwrap())
    });
    c.bench_function("parse_boards_txt_filtered", |b| {
        b.iter(|| platform::parse(black_box(BOARDS_TXT), Some("uno")).unwrap())
    });
}

fn bench_expand(c: &mut Criterion) {
    let mut variables = ConfigStore::variables();
    variables.load(BOARDS_TXT, Some("uno")).unwrap();
    variables.load(PLATFORM_TXT, None).unwrap();
    variables.insert("runtime.tools.avr-gcc.path", "/opt/arduino/tools/avr");
    variables.insert("runtime.ide.version", "10819");
    variables.insert("build.arch", "AVR");
    variables.insert("includes", "\"-I/opt/arduino/cores/arduino\"");

    let mut patterns = ConfigStore::patterns();
    patterns.load(PLATFORM_TXT, None).unwrap();
    let recipe = patterns.get("recipe.cpp.o.pattern").unwrap().to_string();

    c.bench_function("expand_cpp_recipe", |b| {
        b.iter(|| platform::expand(black_box(&recipe), &variables).unwrap())
    });
}

fn bench_scan(c: &mut Criterion) {
    c.bench_function("scan_sketch_declarations", |b| {
        b.iter(|| {
            let mut scanner = DeclarationScanner::new();
            scanner.scan(black_box(SKETCH).lines());
            scanner.declarations()
        })
    });

    let lines: Vec<String> = SKETCH.lines().map(str::to_string).collect();
    c.bench_function("render_sketch", |b| {
        b.iter(|| sketch::render(black_box(&lines), sketch::DEFAULT_UMBRELLA_HEADER))
    });
}

criterion_group!(benches, bench_parse, bench_expand, bench_scan);
criterion_main!(benches);
