//! Starter programs loaded into the editor at startup and on dialect switch.

use crate::dialect::Dialect;

const JAVASCRIPT: &str = r#"// JavaScript playground: start here!
console.log('Hello, world!');

// Type `arr.` on a new line to see array method hints
const arr = [1, 2, 3, 4, 5];
console.log('doubled:', arr.map((n) => n * 2));

// Type `str.` to see string method hints
// Strings index by code point here, so '😀'.length is 1 (browsers say 2)
const str = 'Hello World';
console.log(str.toUpperCase());

// Objects: try `user.`
const user = {
    name: 'Ivan',
    age: 25,
    city: 'Moscow'
};
console.info('user:', user);

// Numbers: try `num.`
const num = 3.14159;
console.log(num.toFixed(2));

// Asynchronous code
function loadPost(id) {
    return new Promise((resolve) => {
        setTimeout(() => resolve({ id, title: 'Hello from the event loop' }), 100);
    });
}

async function main() {
    try {
        const post = await loadPost(1);
        console.log('Loaded:', post);
    } catch (error) {
        console.error('Failed:', error);
    }
}

// Press Run (Ctrl+Enter) and the output appears on the right
main();
"#;

const TYPESCRIPT: &str = r#"// TypeScript playground: start here!
console.log('Hello, TypeScript!');

// Type `arr.` on a new line to see array method hints
const arr: number[] = [1, 2, 3, 4, 5];
console.log('sum:', arr.reduce((a: number, b: number) => a + b, 0));

// Type `str.` to see string method hints
// Strings index by code point here, so '😀'.length is 1 (browsers say 2)
const str: string = 'TypeScript Example';
console.log(str.split(' '));

// Objects: try `user.`
const user: { name: string; age: number } = {
    name: 'Ivan',
    age: 25
};

// Numbers and booleans: try `num.` or `flag.`
const num: number = 3.14159;
const flag: boolean = true;
console.log(num.toFixed(3), flag);

interface User {
    id: number;
    name: string;
    email: string;
    age?: number;
}

class UserService {
    private users: User[] = [];

    addUser(user: User): void {
        this.users.push(user);
        console.log('User added:', user);
    }

    getAllUsers(): User[] {
        return this.users;
    }
}

const service = new UserService();
service.addUser({ id: 1, name: user.name, email: 'ivan@example.com', age: user.age });
console.info('users:', service.getAllUsers().length);

type Status = 'active' | 'inactive' | 'pending';
const userStatus: Status = 'active';

// Press Run (Ctrl+Enter) and the output appears on the right
console.log('Status:', userStatus);
"#;

pub fn sample(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::JavaScript => JAVASCRIPT,
        Dialect::TypeScript => TYPESCRIPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Severity;
    use crate::runner::run_source;
    use crate::script::ExecutionLimits;
    use crate::transpile::TypeStripper;

    #[test]
    fn samples_run_cleanly() {
        for dialect in Dialect::ALL {
            let out = run_source(sample(dialect), dialect, &TypeStripper, &ExecutionLimits::default());
            assert!(
                out.iter().all(|e| e.severity != Severity::Error),
                "{} sample failed: {:?}",
                dialect,
                out
            );
            assert!(out.len() >= 5, "{:?}", out);
        }
    }

    #[test]
    fn async_sample_output_comes_last() {
        let out = run_source(sample(Dialect::JavaScript), Dialect::JavaScript, &TypeStripper, &ExecutionLimits::default());
        let last = out.last().map(|e| e.message.as_str()).unwrap_or_default();
        assert!(last.starts_with("Loaded:"), "{}", last);
        assert!(last.contains("Hello from the event loop"));
    }
}
