use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use arbor_lox::Runner;
use rstest::rstest;

/// A clonable sink the Runner can own while the test keeps reading it.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("sink holds UTF-8")
    }
}

fn run(source: &str) -> (String, String, String) {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let mut runner = Runner::new(Box::new(out.clone()), Box::new(err.clone()));
    let result = runner.run(source);
    (out.contents(), err.contents(), result)
}

#[rstest]
// strings and literals
#[case("string", "print \"hello world\";", "hello world\n", "")]
#[case("multi-line string", "print \"hello\nworld\";", "hello\nworld\n", "")]
#[case("number", "print 342.32461932591235;", "342.32461932591235\n", "")]
#[case("string as boolean", "print \"\" and 34;", "34\n", "")]
#[case("nil as boolean", "print nil and 34;", "nil\n", "")]
// comments
#[case(
    "single-line comment after source",
    "print 1 + 1; // hello",
    "2\n",
    ""
)]
#[case(
    "single-line comment",
    "// hello\n  print 1 + 1;",
    "2\n",
    ""
)]
#[case(
    "line ending without semi-colon",
    "print",
    "",
    "[line 0] Error at end: Expect expression.\n"
)]
// unary, binary, and ternary operations
#[case("arithmetic operations", "print -1 + 2 * 3 - 4 / 5;", "4.2\n", "")]
#[case("decimal arithmetic", "print 1.234 / 5.678;", "0.2173300457907714\n", "")]
#[case(
    "logical operations",
    "print (!true or false) and false;",
    "false\n",
    ""
)]
#[case(
    "ternary",
    "print 3 < 4 ? 2 > 5 ? \"no\" : \"yes\" : \"also no\";",
    "yes\n",
    ""
)]
#[case(
    "string concatenation",
    "print \"hello\" + \" \" + \"world\";",
    "hello world\n",
    ""
)]
#[case(
    "greater than or equal to",
    "print 4 >= 3 ? 3 >= 3 ? 2 >= 3 : true : true;",
    "false\n",
    ""
)]
#[case(
    "less than or equal to",
    "print 4 <= 5 ? 5 <= 5 ? 6 <= 5 : true : true;",
    "false\n",
    ""
)]
#[case("equal to", "print 5 == 5 ? 4 == 5 : true;", "false\n", "")]
#[case("not equal to", "print 4 != 5 ? 5 != 5 : true;", "false\n", "")]
#[case("comma", "print (1, 2);", "2\n", "")]
// variables
#[case("variable declaration", "var a = 10; print a*2;", "20\n", "")]
#[case(
    "variable assignment after declaration",
    "var a; a = 20; print a*2;",
    "40\n",
    ""
)]
#[case(
    "variable re-assignment",
    "var a = 10; print a; a = 20; print a*2;",
    "10\n40\n",
    ""
)]
// conditionals
#[case(
    "if block",
    "if (true) { if (false) { print \"hello\"; } else { print \"world\"; } }",
    "world\n",
    ""
)]
fn corpus(
    #[case] _label: &str,
    #[case] source: &str,
    #[case] expected_out: &str,
    #[case] expected_err: &str,
) {
    let (out, err, _) = run(source);
    assert_eq!(out, expected_out);
    assert_eq!(err, expected_err);
}

#[test]
fn for_loop() {
    let source = "var a = 0;
var temp;

for (var b = 1; a < 10; b = temp + b) {
    print a;
    temp = a;
    a = b;
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "0\n1\n1\n2\n3\n5\n8\n");
    assert_eq!(err, "");
}

#[test]
fn while_loop() {
    let source = "var a = 0;
var temp;
var b = 1;

while (a < 10) {
    print a;
    temp = a;
    a = b;
    b = temp + b;
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "0\n1\n1\n2\n3\n5\n8\n");
    assert_eq!(err, "");
}

#[test]
fn break_statement() {
    let source = "var a = 1;
while (true) {
    a = a + 1;
    print a;
    if (a == 4) break;
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "2\n3\n4\n");
    assert_eq!(err, "");
}

#[test]
fn continue_statement() {
    let source = "var a = 1;
while (a < 10) {
    a = a * 2;
    print a;
    if (a > 4) {
      continue;
    } else {
      a = a + 1;
    }
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "2\n6\n12\n");
    assert_eq!(err, "");
}

#[test]
fn function_call() {
    let source = "fun sayHi(first, last) {
    print \"Hello, \" + first + \" \" + last;
}

sayHi(\"Dear\", \"Reader\");";
    let (out, err, _) = run(source);
    assert_eq!(out, "Hello, Dear Reader\n");
    assert_eq!(err, "");
}

#[test]
fn return_statement() {
    let source = "fun sayHi(first, last) {
    return \"Hello, \" + first + \" \" + last;
}

print sayHi(\"Dear\", \"Reader\");";
    let (out, err, _) = run(source);
    assert_eq!(out, "Hello, Dear Reader\n");
    assert_eq!(err, "");
}

#[test]
fn closure() {
    let source = "fun makeCounter() {
    var i = 0;
    fun count() {
        i = i + 1;
        print i;
    }
    return count;
}

var counter = makeCounter();
counter();
counter();";
    let (out, err, _) = run(source);
    assert_eq!(out, "1\n2\n");
    assert_eq!(err, "");
}

#[test]
fn anonymous_function() {
    let source = "fun makeCounter() {
    var i = 0;
    return fun () {
        i = i + 1;
        print i;
    };
}

var counter = makeCounter();
counter();
counter();";
    let (out, err, _) = run(source);
    assert_eq!(out, "1\n2\n");
    assert_eq!(err, "");
}

#[test]
fn iife() {
    let source = "(fun count(next) {
    print next;
    if (next < 5) return count(next + 1);
    return;
})(1);";
    let (out, err, _) = run(source);
    assert_eq!(out, "1\n2\n3\n4\n5\n");
    assert_eq!(err, "");
}

#[test]
fn calling_function_with_wrong_arity() {
    let source = "fun sayHello(a, b) {
    print a + b;
}
sayHello(\"only first\");";
    let (out, err, _) = run(source);
    assert_eq!(out, "");
    assert_eq!(err, "Expected 2 arguments but got 1.\n[line 3]\n");
}

#[test]
fn closures_capture_the_definition_scope() {
    let source = "var a = \"global\";
{
    fun showA() {
        print a;
    }

    showA();
    var a = \"block\";
    showA();
    a; // mutes error about the local variable not being used
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "global\nglobal\n");
    assert_eq!(err, "");
}

#[test]
fn redeclaring_variable_in_same_scope() {
    let source = "{
    var a = \"global\";
    var a = \"global2\";
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "");
    assert_eq!(
        err,
        "[line 2] Error at 'a': Already a variable with this name in this scope\n\
         [line 2] Error at 'a': Variable 'a' declared but not used.\n"
    );
}

#[test]
fn unused_local_variable() {
    let source = "{
    var a = \"global\";
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "");
    assert_eq!(
        err,
        "[line 1] Error at 'a': Variable 'a' declared but not used.\n"
    );
}

#[test]
fn class_method() {
    let source = "class Bacon {
    eat() {
        print \"Crunch crunch\";
    }
}
Bacon().eat();";
    let (out, err, _) = run(source);
    assert_eq!(out, "Crunch crunch\n");
    assert_eq!(err, "");
}

#[test]
fn this_reads_instance_fields() {
    let source = "class Cake {
    taste() {
        var adjective = \"delicious\";
        print \"The \" + this.flavor + \" cake is \" + adjective + \"!\";
    }
}

var cake = Cake();
cake.flavor = \"German chocolate\";
cake.taste();";
    let (out, err, _) = run(source);
    assert_eq!(out, "The German chocolate cake is delicious!\n");
    assert_eq!(err, "");
}

#[test]
fn init_method() {
    let source = "class Circle {
    init(radius) {
        this.radius = radius;
    }

    area() {
        return 3.141592653 * this.radius * this.radius;
    }
}

var circle = Circle(7);
print circle.area();";
    let (out, err, _) = run(source);
    assert_eq!(out, "153.938039997\n");
    assert_eq!(err, "");
}

#[test]
fn method_called_through_the_class_value() {
    let source = "class Math {
    add(x, y) {
        return x + y;
    }
}

print Math.add(1, 2);";
    let (out, err, _) = run(source);
    assert_eq!(out, "3\n");
    assert_eq!(err, "");
}

#[test]
fn getter() {
    let source = "class Circle {
    init(radius) {
        this.radius = radius;
    }

    area {
        return 3.141592653 * this.radius * this.radius;
    }
}

var circle = Circle(7);
print circle.area;";
    let (out, err, _) = run(source);
    assert_eq!(out, "153.938039997\n");
    assert_eq!(err, "");
}

#[test]
fn inheritance() {
    let source = "class Doughnut {
    cook() {
        print \"Fry until golden brown.\";
    }
}

class BostonCream < Doughnut {}

BostonCream.cook();";
    let (out, err, _) = run(source);
    assert_eq!(out, "Fry until golden brown.\n");
    assert_eq!(err, "");
}

#[test]
fn calling_super() {
    let source = "class Doughnut {
    cook() {
        print \"Fry until golden brown.\";
    }
}

class BostonCream < Doughnut {
    cook() {
        super.cook();
        print \"Pipe full of custard and coat with chocolate.\";
    }
}

BostonCream().cook();";
    let (out, err, _) = run(source);
    assert_eq!(
        out,
        "Fry until golden brown.\nPipe full of custard and coat with chocolate.\n"
    );
    assert_eq!(err, "");
}

#[test]
fn calling_super_outside_class() {
    let (out, err, _) = run("super.hello();");
    assert_eq!(out, "");
    assert_eq!(
        err,
        "[line 0] Error at 'super': Can't use 'super' outside of a class.\n"
    );
}

#[test]
fn calling_super_in_class_without_superclass() {
    let source = "class Doughnut {
    cook() {
      super.cook();
    }
}";
    let (out, err, _) = run(source);
    assert_eq!(out, "");
    assert_eq!(
        err,
        "[line 2] Error at 'super': Can't use 'super' in a class with no superclass.\n"
    );
}

#[test]
fn runtime_error_format_includes_line() {
    let (out, err, _) = run("var x = 1;\nprint -\"mano\" + x;");
    assert_eq!(out, "");
    assert_eq!(err, "Operand must be a number.\n[line 1]\n");
}

#[test]
fn run_returns_last_expression_value() {
    let (_, _, result) = run("1 + 2;");
    assert_eq!(result, "3");
}

#[test]
fn run_returns_nil_on_static_errors() {
    let (_, err, result) = run("print");
    assert_eq!(result, "nil");
    assert!(!err.is_empty());
}

#[test]
fn lexical_errors_stop_before_evaluation() {
    let (out, err, result) = run("@\nprint 1;");
    assert_eq!(out, "", "nothing may execute after a lexical error");
    assert_eq!(err, "[line 0] Error: Unexpected character.\n");
    assert_eq!(result, "nil");
}

#[test]
fn multiple_lexical_errors_surface_in_one_pass() {
    let (_, err, _) = run("@ $");
    assert_eq!(
        err,
        "[line 0] Error: Unexpected character.\n[line 0] Error: Unexpected character.\n"
    );
}

#[test]
fn definitions_persist_across_runs() {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let mut runner = Runner::new(Box::new(out.clone()), Box::new(err.clone()));

    runner.run("var x = 42;");
    runner.run("print x;");

    assert_eq!(out.contents(), "42\n");
    assert_eq!(err.contents(), "");
}

#[test]
fn errors_dont_affect_subsequent_runs() {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let mut runner = Runner::new(Box::new(out.clone()), Box::new(err.clone()));

    assert_eq!(runner.run("@"), "nil");
    assert_eq!(runner.run("print 42;"), "nil");
    assert_eq!(out.contents(), "42\n");
}
